use serde::Serialize;
use tracing::debug;
use wimaxll_frame::RfState;

use crate::cmd::{open_handle, parse_duration, InfoArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct GroupInfo {
    name: String,
    id: u32,
}

#[derive(Serialize)]
struct RadioInfo {
    hw_on: bool,
    sw_on: bool,
}

#[derive(Serialize)]
struct InfoOutput {
    ifname: String,
    ifindex: u32,
    family_id: u16,
    family_version: u32,
    groups: Vec<GroupInfo>,
    state: Option<String>,
    radio: Option<RadioInfo>,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.device.timeout)?;
    let mut handle = open_handle(&args.device.ifname, Some(timeout))?;

    // Older drivers answer neither request; report what is available.
    let state = match handle.state_get() {
        Ok(state) => Some(state.to_string()),
        Err(err) => {
            debug!(%err, "state query failed");
            None
        }
    };
    let radio = match handle.rfkill(RfState::Query) {
        Ok(status) => Some(RadioInfo {
            hw_on: status.hw_on,
            sw_on: status.sw_on,
        }),
        Err(err) => {
            debug!(%err, "radio query failed");
            None
        }
    };

    let family = handle.family();
    let out = InfoOutput {
        ifname: handle.ifname().to_string(),
        ifindex: handle.ifindex(),
        family_id: family.id,
        family_version: family.version,
        groups: family
            .groups
            .iter()
            .map(|g| GroupInfo {
                name: g.name.clone(),
                id: g.id,
            })
            .collect(),
        state,
        radio,
    };
    handle.close();

    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    let groups = out
        .groups
        .iter()
        .map(|g| format!("{} ({})", g.name, g.id))
        .collect::<Vec<_>>()
        .join(", ");
    let radio = match &out.radio {
        Some(r) => format!(
            "hw {} sw {}",
            if r.hw_on { "on" } else { "off" },
            if r.sw_on { "on" } else { "off" }
        ),
        None => "unavailable".to_string(),
    };
    let state = out.state.as_deref().unwrap_or("unavailable");

    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(&[
            ("Interface", format!("{} (index {})", out.ifname, out.ifindex)),
            ("Family", format!("{:#x} v{}", out.family_id, out.family_version)),
            ("Pipes", groups),
            ("State", state.to_string()),
            ("Radio", radio),
        ]),
        OutputFormat::Pretty => {
            println!("Device Info:");
            println!("  Interface: {} (index {})", out.ifname, out.ifindex);
            println!("  Family:    {:#x} v{}", out.family_id, out.family_version);
            println!("  Pipes:     {groups}");
            println!("  State:     {state}");
            println!("  Radio:     {radio}");
        }
        OutputFormat::Raw => println!("{state}"),
    }
}
