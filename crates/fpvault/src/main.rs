mod cmd;
mod exit;
mod link;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "fpvault", version, about = "Pocket biometric password manager")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_subcommand() {
        let cli = Cli::try_parse_from([
            "fpvault",
            "add",
            "example.com",
            "dXNlcg==",
            "cGFzcw==",
            "--socket",
            "/tmp/fpvault.sock",
            "--master",
            "hunter2",
        ])
        .expect("add args should parse");
        assert!(matches!(cli.command, Command::Add(_)));
    }

    #[test]
    fn rejects_port_and_socket_together() {
        let err = Cli::try_parse_from([
            "fpvault",
            "sites",
            "--port",
            "/dev/ttyACM0",
            "--socket",
            "/tmp/fpvault.sock",
        ])
        .expect_err("conflicting link args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_update_with_partial_fields() {
        let cli = Cli::try_parse_from([
            "fpvault",
            "update",
            "example.com",
            "--password",
            "bmV3",
            "--socket",
            "/tmp/fpvault.sock",
            "--master",
            "hunter2",
        ])
        .expect("update args should parse");
        let Command::Update(args) = cli.command else {
            panic!("expected update command");
        };
        assert!(args.username.is_none());
        assert_eq!(args.password.as_deref(), Some("bmV3"));
    }

    #[test]
    fn parses_simulate_subcommand() {
        let cli = Cli::try_parse_from([
            "fpvault",
            "simulate",
            "/tmp/fpvault.sock",
            "--flash",
            "/tmp/flash.bin",
        ])
        .expect("simulate args should parse");
        assert!(matches!(cli.command, Command::Simulate(_)));
    }

    #[test]
    fn master_password_is_required_for_privileged_commands() {
        let err = Cli::try_parse_from([
            "fpvault",
            "get",
            "example.com",
            "--socket",
            "/tmp/fpvault.sock",
        ])
        .expect_err("get without master should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}
