use crate::cmd::{connect, unlock, with_touch_retry, UpdateArgs};
use crate::exit::{host_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: UpdateArgs) -> CliResult<i32> {
    if args.username.is_none() && args.password.is_none() {
        return Err(CliError::new(
            USAGE,
            "nothing to update: pass --username, --password, or both",
        ));
    }

    let mut client = connect(&args.link)?;
    unlock(&mut client, &args.auth)?;

    // The wire has no combined update, so each field is its own request
    // behind its own biometric check.
    if let Some(username) = &args.username {
        with_touch_retry(args.auth.touch_retries, || {
            client.change_username(&args.sitename, username)
        })
        .map_err(|err| host_error("failed updating username", err))?;
    }
    if let Some(password) = &args.password {
        with_touch_retry(args.auth.touch_retries, || {
            client.change_password(&args.sitename, password)
        })
        .map_err(|err| host_error("failed updating password", err))?;
    }

    tracing::info!(sitename = %args.sitename, "entry updated");
    Ok(SUCCESS)
}
