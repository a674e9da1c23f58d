use std::fs;

use serde::Serialize;

use crate::cmd::{open_handle, parse_duration, SendArgs};
use crate::exit::{handle_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct SendOutput<'a> {
    ifname: &'a str,
    seq: u32,
    bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack: Option<i32>,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let mut handle = open_handle(&args.ifname, Some(wait_timeout))?;
    let bytes = handle
        .msg_write(&payload)
        .map_err(|err| handle_error("send failed", err))?;
    let seq = handle.last_seq();

    let ack = if args.wait {
        Some(
            handle
                .wait_for_ack(seq, Some(wait_timeout))
                .map_err(|err| handle_error("acknowledgement failed", err))?,
        )
    } else {
        None
    };

    let out = SendOutput {
        ifname: &args.ifname,
        seq,
        bytes,
        ack,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => match ack {
            Some(code) => println!("{}: sent {bytes} bytes (seq {seq}), ack {code}", args.ifname),
            None => println!("{}: sent {bytes} bytes (seq {seq})", args.ifname),
        },
        OutputFormat::Raw => println!("{seq}"),
    }
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return decode_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "one of --data, --hex or --file is required"))
}

fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}
