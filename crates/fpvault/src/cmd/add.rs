use crate::cmd::{connect, unlock, with_touch_retry, AddArgs};
use crate::exit::{host_error, CliResult, SUCCESS};

pub fn run(args: AddArgs) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    unlock(&mut client, &args.auth)?;

    with_touch_retry(args.auth.touch_retries, || {
        client.add_password(&args.sitename, &args.username, &args.password)
    })
    .map_err(|err| host_error("failed storing entry", err))?;

    tracing::info!(sitename = %args.sitename, "entry stored");
    Ok(SUCCESS)
}
