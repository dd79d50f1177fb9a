use crate::cmd::{connect, unlock, with_touch_retry, EnrollArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_fingerprint, OutputFormat};

pub fn run(args: EnrollArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    unlock(&mut client, &args.auth)?;

    let (fp_id, fp_hash) =
        with_touch_retry(args.auth.touch_retries, || client.enroll_fingerprint(&args.name))
            .map_err(|err| host_error("failed enrolling fingerprint", err))?;

    print_fingerprint(fp_id, &fp_hash, format);
    Ok(SUCCESS)
}
