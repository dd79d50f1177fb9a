use crate::cmd::{connect, unlock, with_touch_retry, RemoveArgs};
use crate::exit::{host_error, CliResult, SUCCESS};

pub fn run(args: RemoveArgs) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    unlock(&mut client, &args.auth)?;

    with_touch_retry(args.auth.touch_retries, || {
        client.remove_password(&args.sitename)
    })
    .map_err(|err| host_error("failed removing entry", err))?;

    tracing::info!(sitename = %args.sitename, "entry removed");
    Ok(SUCCESS)
}
