use std::time::Instant;

use wimaxll_frame::Notification;

use crate::cmd::{open_handle, parse_duration, WaitStateArgs};
use crate::exit::{handle_error, CliResult, SUCCESS};
use crate::output::{print_event, EventOutput, OutputFormat};

pub fn run(args: WaitStateArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let mut handle = open_handle(&args.ifname, timeout)?;
    let deadline = timeout.map(|t| Instant::now() + t);

    for _ in 0..args.count {
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        let (old, new) = handle
            .wait_for_state_change(remaining)
            .map_err(|err| handle_error("wait for state change failed", err))?;

        let notification = Notification::StateChange {
            ifindex: Some(handle.ifindex()),
            old,
            new,
        };
        print_event(
            &EventOutput::new(handle.ifname(), "msg", &notification),
            None,
            format,
        );
    }
    Ok(SUCCESS)
}
