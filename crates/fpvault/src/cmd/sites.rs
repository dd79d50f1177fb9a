use crate::cmd::{connect, SitesArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_sites, OutputFormat};

pub fn run(args: SitesArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    let sitenames = client
        .get_all_site_names()
        .map_err(|err| host_error("failed listing sites", err))?;
    print_sites(&sitenames, format);
    Ok(SUCCESS)
}
