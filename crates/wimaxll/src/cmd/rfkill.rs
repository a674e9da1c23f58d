use serde::Serialize;
use wimaxll_frame::{RfState, RfStatus};

use crate::cmd::{open_handle, parse_duration, RfkillArgs};
use crate::exit::{handle_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct RfkillOutput<'a> {
    ifname: &'a str,
    requested: &'static str,
    hw_on: bool,
    sw_on: bool,
    radio_on: bool,
}

pub fn run(args: RfkillArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut handle = open_handle(&args.ifname, Some(timeout))?;
    let requested = RfState::from(args.state);
    let status = handle
        .rfkill(requested)
        .map_err(|err| handle_error("rfkill failed", err))?;

    print_status(&args.ifname, requested, status, format);
    Ok(SUCCESS)
}

fn print_status(ifname: &str, requested: RfState, status: RfStatus, format: OutputFormat) {
    let out = RfkillOutput {
        ifname,
        requested: match requested {
            RfState::On => "on",
            RfState::Off => "off",
            RfState::Query => "query",
        },
        hw_on: status.hw_on,
        sw_on: status.sw_on,
        radio_on: status.radio_on(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(&[
            ("Interface", ifname.to_string()),
            ("Hardware switch", on_off(status.hw_on).to_string()),
            ("Software switch", on_off(status.sw_on).to_string()),
        ]),
        OutputFormat::Pretty => println!("{ifname}: {status}"),
        OutputFormat::Raw => println!("{}", status.bits()),
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
