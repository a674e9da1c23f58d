use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wimaxll_frame::Notification;
use wimaxll_handle::{
    Callback, CallbackContext, CbContext, DeviceInfo, Error, Flow, Handle, PipeId, MSG_PIPE_ID,
};
use wimaxll_transport::wait_any_readable;

use crate::cmd::{open_handle, ListenArgs};
use crate::exit::{handle_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_event, EventOutput, OutputFormat};

/// How often the loop wakes up to notice Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct ListenContext {
    base: CbContext,
    pipe: String,
    events: Vec<Notification>,
}

impl CallbackContext for ListenContext {
    fn base(&self) -> &CbContext {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CbContext {
        &mut self.base
    }
}

fn collect(_: &DeviceInfo, ctx: Option<&mut dyn CallbackContext>, n: &Notification) -> Flow {
    if let Some(listen) = ctx.and_then(|c| c.downcast_mut::<ListenContext>()) {
        listen.events.push(n.clone());
    }
    Flow::Continue
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut handle = open_handle(&args.ifname, None)?;
    let mut ids = vec![MSG_PIPE_ID];
    for name in &args.pipes {
        let id = handle
            .open_pipe(name)
            .map_err(|err| handle_error(&format!("open pipe {name} failed"), err))?;
        ids.push(id);
    }

    let mut contexts = Vec::with_capacity(ids.len());
    for &id in &ids {
        let ctx = Rc::new(RefCell::new(ListenContext {
            base: CbContext::for_device(handle.device().clone()),
            pipe: handle
                .pipe_name(id)
                .map_err(|err| handle_error("pipe lookup failed", err))?
                .to_string(),
            events: Vec::new(),
        }));
        handle
            .set_callback(id, Some(Callback::with_context(collect, ctx.clone())))
            .map_err(|err| handle_error("install callback failed", err))?;
        contexts.push(ctx);
    }

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let fds = ids
            .iter()
            .map(|&id| handle.pipe_fd(id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| handle_error("listen failed", err))?;
        let ready = wait_any_readable(&fds, Some(POLL_INTERVAL))
            .map_err(|err| io_error("poll failed", err))?;

        for (index, &id) in ids.iter().enumerate() {
            if ready.contains(&index) || pending(&handle, id) {
                match handle.pipe_read(id) {
                    Ok(_) | Err(Error::WouldBlock) => {}
                    Err(err) => return Err(handle_error("read failed", err)),
                }
            }
        }

        for ctx in &contexts {
            let mut ctx = ctx.borrow_mut();
            let events = std::mem::take(&mut ctx.events);
            for notification in events {
                let raw = match &notification {
                    Notification::MsgToUser { data, .. } => Some(&data[..]),
                    _ => None,
                };
                print_event(
                    &EventOutput::new(handle.ifname(), &ctx.pipe, &notification),
                    raw,
                    format,
                );
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}

fn pending(handle: &Handle, id: PipeId) -> bool {
    handle.has_pending(id).unwrap_or(false)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
