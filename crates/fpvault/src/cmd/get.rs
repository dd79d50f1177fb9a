use crate::cmd::{connect, unlock, with_touch_retry, GetArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_credential, OutputFormat};

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    unlock(&mut client, &args.auth)?;

    let (username, password) =
        with_touch_retry(args.auth.touch_retries, || client.get_password(&args.sitename))
            .map_err(|err| host_error("failed fetching credential", err))?;

    print_credential(&args.sitename, &username, &password, format);
    Ok(SUCCESS)
}
