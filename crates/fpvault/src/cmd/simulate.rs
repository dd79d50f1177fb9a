use std::os::unix::net::UnixListener;

use fpvault_device::{
    AuthEngine, CredentialStore, DeviceService, Dispatcher, FileFlash, ScriptedSensor,
};

use crate::cmd::SimulateArgs;
use crate::exit::{io_error, CliError, CliResult, INTERNAL};

/// Serve a simulated device, one connection at a time.
///
/// The flash region persists in the given file, so stored credentials
/// survive reconnects and restarts. The sensor is in-memory and every
/// capture matches, which means each new connection sees a freshly
/// power-cycled, factory-password device: any master password
/// bootstraps a session, and a locked-out device recovers on reconnect.
pub fn run(args: SimulateArgs) -> CliResult<i32> {
    if args.socket.exists() {
        std::fs::remove_file(&args.socket)
            .map_err(|err| io_error("failed removing stale socket", err))?;
    }
    let listener = UnixListener::bind(&args.socket)
        .map_err(|err| io_error("failed binding simulator socket", err))?;
    tracing::info!(
        socket = %args.socket.display(),
        flash = %args.flash.display(),
        "simulated device listening"
    );

    loop {
        let (stream, _) = listener
            .accept()
            .map_err(|err| io_error("accept failed", err))?;
        tracing::info!("host connected");

        let auth = AuthEngine::boot(ScriptedSensor::always_matching())
            .map_err(|err| CliError::new(INTERNAL, format!("sensor boot failed: {err}")))?;
        let store = CredentialStore::open(FileFlash::new(&args.flash))
            .map_err(|err| CliError::new(INTERNAL, format!("flash open failed: {err}")))?;

        let mut service = DeviceService::new(stream, Dispatcher::new(auth, store));
        if let Err(err) = service.run() {
            tracing::warn!(error = %err, "connection ended with error");
        }
    }
}
