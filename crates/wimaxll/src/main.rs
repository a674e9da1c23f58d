mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wimaxll", version, about = "WiMAX device control CLI")]
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
    fn parses_rfkill_subcommand() {
        let cli = Cli::try_parse_from(["wimaxll", "rfkill", "wmx0", "off"])
            .expect("rfkill args should parse");
        assert!(matches!(cli.command, Command::Rfkill(_)));
    }

    #[test]
    fn rejects_unknown_radio_state() {
        let err = Cli::try_parse_from(["wimaxll", "rfkill", "wmx0", "sideways"])
            .expect_err("unknown state should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "wimaxll", "send", "wmx0", "--data", "hello", "--hex", "00ff",
        ])
        .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_listen_with_pipes() {
        let cli = Cli::try_parse_from([
            "wimaxll", "listen", "wmx0", "--pipes", "diag,trace", "--count", "3",
        ])
        .expect("listen args should parse");
        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.pipes, vec!["diag".to_string(), "trace".to_string()]);
        assert_eq!(args.count, Some(3));
    }
}
