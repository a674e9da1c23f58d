use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use wimaxll_frame::RfState;
use wimaxll_handle::{Handle, HandleConfig};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod listen;
pub mod reset;
pub mod rfkill;
pub mod send;
pub mod version;
pub mod wait_state;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show device, family and radio information.
    Info(InfoArgs),
    /// Turn the radio on or off, or query the switch status.
    Rfkill(RfkillArgs),
    /// Reset the device.
    Reset(DeviceArgs),
    /// Wait for device state changes.
    WaitState(WaitStateArgs),
    /// Print notifications from the control pipe and named pipes.
    Listen(ListenArgs),
    /// Send a driver message on the control pipe.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Rfkill(args) => rfkill::run(args, format),
        Command::Reset(args) => reset::run(args, format),
        Command::WaitState(args) => wait_state::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// WiMAX network interface (e.g. wmx0).
    pub ifname: String,
    /// Deadline for the kernel's answer (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RadioArg {
    On,
    Off,
    Query,
}

impl From<RadioArg> for RfState {
    fn from(arg: RadioArg) -> Self {
        match arg {
            RadioArg::On => RfState::On,
            RadioArg::Off => RfState::Off,
            RadioArg::Query => RfState::Query,
        }
    }
}

#[derive(Args, Debug)]
pub struct RfkillArgs {
    /// WiMAX network interface (e.g. wmx0).
    pub ifname: String,
    /// Requested radio state.
    #[arg(value_enum, default_value = "query")]
    pub state: RadioArg,
    /// Deadline for the kernel's answer (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WaitStateArgs {
    /// WiMAX network interface (e.g. wmx0).
    pub ifname: String,
    /// Give up after this long (e.g. 30s). Default: wait forever.
    #[arg(long)]
    pub timeout: Option<String>,
    /// Number of state changes to wait for.
    #[arg(long, default_value = "1")]
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// WiMAX network interface (e.g. wmx0).
    pub ifname: String,
    /// Named pipes to open besides the control pipe (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub pipes: Vec<String>,
    /// Exit after printing N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// WiMAX network interface (e.g. wmx0).
    pub ifname: String,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded payload (e.g. 0a1b2c).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Wait for the kernel's acknowledgement.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the acknowledgement (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open `ifname` through generic netlink.
#[cfg(target_os = "linux")]
pub fn open_handle(ifname: &str, request_timeout: Option<Duration>) -> CliResult<Handle> {
    let config = HandleConfig {
        request_timeout,
        ..HandleConfig::default()
    };
    let backend = wimaxll_handle::GenlBackend::new(config.frame.clone());
    Handle::open_with(ifname, backend, config)
        .map_err(|err| crate::exit::handle_error(&format!("open {ifname} failed"), err))
}

#[cfg(not(target_os = "linux"))]
pub fn open_handle(ifname: &str, _request_timeout: Option<Duration>) -> CliResult<Handle> {
    let _ = HandleConfig::default();
    Err(CliError::new(
        crate::exit::NO_DEVICE,
        format!("open {ifname} failed: WiMAX devices require Linux generic netlink"),
    ))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn radio_arg_maps_to_rf_state() {
        assert_eq!(RfState::from(RadioArg::Off), RfState::Off);
        assert_eq!(RfState::from(RadioArg::Query), RfState::Query);
    }
}
