use fpvault_proto::Settings;

use crate::cmd::{connect, unlock, with_touch_retry, SettingsArgs};
use crate::exit::{host_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_settings, OutputFormat};

pub fn run(args: SettingsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.link)?;
    unlock(&mut client, &args.auth)?;

    if let Some(replacement) = &args.replace {
        let settings: Settings = serde_json::from_str(replacement)
            .map_err(|err| CliError::new(DATA_INVALID, format!("--replace is not valid settings JSON: {err}")))?;
        with_touch_retry(args.auth.touch_retries, || {
            client.set_settings(settings.clone())
        })
        .map_err(|err| host_error("failed replacing settings", err))?;
    }

    let settings = with_touch_retry(args.auth.touch_retries, || client.get_settings())
        .map_err(|err| host_error("failed reading settings", err))?;
    print_settings(&settings, format);
    Ok(SUCCESS)
}
