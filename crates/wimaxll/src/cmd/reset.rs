use tracing::info;

use crate::cmd::{open_handle, parse_duration, DeviceArgs};
use crate::exit::{handle_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut handle = open_handle(&args.ifname, Some(timeout))?;
    handle
        .reset()
        .map_err(|err| handle_error("reset failed", err))?;
    info!(ifname = %args.ifname, "device reset");

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "ifname": args.ifname,
            "reset": true,
        })),
        OutputFormat::Table | OutputFormat::Pretty => println!("{}: reset", args.ifname),
        OutputFormat::Raw => {}
    }
    Ok(SUCCESS)
}
