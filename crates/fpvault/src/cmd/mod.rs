use clap::{Args, Subcommand};
use std::path::PathBuf;

use fpvault_host::{HostClient, HostError, RetryConfig};

use crate::exit::{host_error, CliError, CliResult, PERMISSION_DENIED};
use crate::link::{DeviceLink, LinkArgs};
use crate::output::OutputFormat;

pub mod add;
pub mod delete_fp;
pub mod enroll;
pub mod get;
pub mod remove;
pub mod settings;
pub mod simulate;
pub mod sites;
pub mod update;
pub mod verify_fp;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stored site names.
    Sites(SitesArgs),
    /// Fetch the stored credential pair for a site.
    Get(GetArgs),
    /// Store a new credential entry.
    Add(AddArgs),
    /// Replace the stored username and/or password for a site.
    Update(UpdateArgs),
    /// Remove a site entry.
    Remove(RemoveArgs),
    /// Show or replace device settings.
    Settings(SettingsArgs),
    /// Enroll a new fingerprint.
    Enroll(EnrollArgs),
    /// Delete an enrolled fingerprint.
    DeleteFp(DeleteFpArgs),
    /// Run one fingerprint capture/match cycle.
    VerifyFp(VerifyFpArgs),
    /// Serve a simulated device on a Unix socket.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Sites(args) => sites::run(args, format),
        Command::Get(args) => get::run(args, format),
        Command::Add(args) => add::run(args),
        Command::Update(args) => update::run(args),
        Command::Remove(args) => remove::run(args),
        Command::Settings(args) => settings::run(args, format),
        Command::Enroll(args) => enroll::run(args, format),
        Command::DeleteFp(args) => delete_fp::run(args),
        Command::VerifyFp(args) => verify_fp::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Master-password session options shared by privileged commands.
#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Master password (prefer setting the environment variable).
    #[arg(long, env = "FPVAULT_MASTER", hide_env_values = true)]
    pub master: String,

    /// Fingerprint attempts before giving up. The device hard-locks
    /// after 5 consecutive failures, so keep this below that.
    #[arg(long, default_value_t = 3)]
    pub touch_retries: u32,
}

#[derive(Args, Debug)]
pub struct SitesArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Site to look up.
    pub sitename: String,
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Site to store under. Must not already exist.
    pub sitename: String,
    /// Ciphertext username (base64, as produced by the client cipher).
    pub username: String,
    /// Ciphertext password (base64, as produced by the client cipher).
    pub password: String,
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Site to update.
    pub sitename: String,
    /// New ciphertext username.
    #[arg(long)]
    pub username: Option<String>,
    /// New ciphertext password.
    #[arg(long)]
    pub password: Option<String>,
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Site to remove.
    pub sitename: String,
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Replace the settings with this JSON object before printing.
    #[arg(long, value_name = "JSON")]
    pub replace: Option<String>,
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug)]
pub struct EnrollArgs {
    /// Display name for the new fingerprint.
    pub name: String,
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug)]
pub struct DeleteFpArgs {
    /// Slot id of the fingerprint to delete (see `settings`).
    pub fp_id: u16,
    #[command(flatten)]
    pub link: LinkArgs,
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args, Debug)]
pub struct VerifyFpArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub socket: PathBuf,
    /// File backing the simulated flash region.
    #[arg(long, default_value = "fpvault-flash.bin")]
    pub flash: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open the link and wrap it in a client with the default resend policy.
pub(crate) fn connect(link: &LinkArgs) -> CliResult<HostClient<DeviceLink>> {
    let retry = RetryConfig::default();
    let link = DeviceLink::open(link, retry.read_timeout)?;
    Ok(HostClient::with_retry(link, retry))
}

/// Establish the master-password session for a privileged command.
pub(crate) fn unlock(client: &mut HostClient<DeviceLink>, auth: &AuthArgs) -> CliResult<()> {
    let valid = client
        .verify_master_hash(&auth.master)
        .map_err(|err| host_error("master password check failed", err))?;
    if !valid {
        return Err(CliError::new(
            PERMISSION_DENIED,
            "master password rejected by device",
        ));
    }
    Ok(())
}

/// Re-run a privileged operation while the device reports a fingerprint
/// mismatch, up to the attempt budget. Each rejection burns one of the
/// device's own lockout attempts too.
pub(crate) fn with_touch_retry<T>(
    tries: u32,
    mut op: impl FnMut() -> Result<T, HostError>,
) -> Result<T, HostError> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(HostError::BiometricRejected) => {
                attempt += 1;
                if attempt >= tries {
                    return Err(HostError::BiometricRejected);
                }
                tracing::warn!(
                    attempt,
                    max = tries,
                    "fingerprint not recognized, touch the sensor again"
                );
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_retry_stops_at_budget() {
        let mut calls = 0;
        let err = with_touch_retry(3, || -> Result<(), HostError> {
            calls += 1;
            Err(HostError::BiometricRejected)
        })
        .unwrap_err();
        assert!(matches!(err, HostError::BiometricRejected));
        assert_eq!(calls, 3);
    }

    #[test]
    fn touch_retry_passes_through_success() {
        let mut calls = 0;
        let value = with_touch_retry(3, || -> Result<u32, HostError> {
            calls += 1;
            if calls < 2 {
                Err(HostError::BiometricRejected)
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls, 2);
    }

    #[test]
    fn touch_retry_does_not_mask_other_errors() {
        let err = with_touch_retry(3, || -> Result<(), HostError> {
            Err(HostError::DeviceLocked)
        })
        .unwrap_err();
        assert!(matches!(err, HostError::DeviceLocked));
    }
}
