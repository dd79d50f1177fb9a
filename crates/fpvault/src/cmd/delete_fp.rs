use crate::cmd::{connect, unlock, with_touch_retry, DeleteFpArgs};
use crate::exit::{host_error, CliResult, SUCCESS};

pub fn run(args: DeleteFpArgs) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    unlock(&mut client, &args.auth)?;

    with_touch_retry(args.auth.touch_retries, || {
        client.delete_fingerprint(args.fp_id)
    })
    .map_err(|err| host_error("failed deleting fingerprint", err))?;

    tracing::info!(fp_id = args.fp_id, "fingerprint deleted");
    Ok(SUCCESS)
}
