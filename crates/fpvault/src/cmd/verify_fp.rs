use crate::cmd::{connect, VerifyFpArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_fingerprint, OutputFormat};

pub fn run(args: VerifyFpArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    let (fp_id, fp_hash) = client
        .verify_fingerprint()
        .map_err(|err| host_error("fingerprint verification failed", err))?;
    print_fingerprint(fp_id, &fp_hash, format);
    Ok(SUCCESS)
}
