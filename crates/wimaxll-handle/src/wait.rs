//! Blocking helpers built on the callback mechanism.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::debug;
use wimaxll_frame::{DeviceState, Notification};
use wimaxll_transport::wait_readable;

use crate::buffer::MsgBuffer;
use crate::context::{Callback, CallbackContext, CbContext, DeviceInfo, Flow};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::registry::{PipeId, MSG_PIPE_ID};

type Matcher<T> = Box<dyn FnMut(&Notification) -> Option<T>>;

struct WaitContext<T> {
    base: CbContext,
    matcher: Matcher<T>,
    previous: Option<Callback>,
    outcome: Option<T>,
    forward_error: Option<Error>,
}

impl<T: 'static> CallbackContext for WaitContext<T> {
    fn base(&self) -> &CbContext {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CbContext {
        &mut self.base
    }
}

fn oneshot<T: 'static>(
    device: &DeviceInfo,
    ctx: Option<&mut dyn CallbackContext>,
    notification: &Notification,
) -> Flow {
    let Some(wait) = ctx.and_then(|c| c.downcast_mut::<WaitContext<T>>()) else {
        return Flow::Continue;
    };
    if wait.base.msg_done {
        return Flow::Stop;
    }

    if let Some(value) = (wait.matcher)(notification) {
        wait.outcome = Some(value);
        wait.base.set_result(0);
        wait.base.msg_done = true;
        return Flow::Stop;
    }

    let Some(previous) = &wait.previous else {
        return Flow::Continue;
    };
    match previous.invoke(device, notification) {
        Ok(flow) => flow,
        Err(err) => {
            debug!(%err, "installed callback refused a forwarded notification");
            wait.forward_error = Some(err);
            wait.base.requeue = true;
            Flow::Stop
        }
    }
}

impl Handle {
    /// Block until a notification on pipe `id` satisfies `matcher`.
    ///
    /// While waiting, notifications the matcher rejects go to the callback
    /// installed on the pipe. That callback is back in place when this
    /// returns, whatever the outcome. `None` waits without a deadline; a
    /// zero timeout still takes a notification that is already queued.
    /// If the installed callback cannot take a forwarded notification, the
    /// frame stays queued and the wait returns that callback's error.
    pub fn wait_for<T, F>(&mut self, id: PipeId, timeout: Option<Duration>, matcher: F) -> Result<T>
    where
        T: 'static,
        F: FnMut(&Notification) -> Option<T> + 'static,
    {
        self.ensure_valid()?;
        let previous = self.callback(id)?;
        let ctx = Rc::new(RefCell::new(WaitContext {
            base: CbContext::for_device(self.device.clone()),
            matcher: Box::new(matcher),
            previous: previous.clone(),
            outcome: None,
            forward_error: None,
        }));
        self.set_callback(id, Some(Callback::with_context(oneshot::<T>, ctx.clone())))?;

        let result = self.drive(id, timeout, &ctx);

        self.set_callback(id, previous)?;
        result
    }

    fn drive<T>(
        &mut self,
        id: PipeId,
        timeout: Option<Duration>,
        ctx: &Rc<RefCell<WaitContext<T>>>,
    ) -> Result<T> {
        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        loop {
            let remaining = deadline.map(|(at, _)| at.saturating_duration_since(Instant::now()));
            let ready = self.has_pending(id)? || wait_readable(self.pipe_fd(id)?, remaining)?;

            if ready {
                match self.pipe_read(id) {
                    Ok(_) | Err(Error::WouldBlock) => {}
                    Err(err) => return Err(ctx.borrow_mut().forward_error.take().unwrap_or(err)),
                }
                let mut wait = ctx.borrow_mut();
                if wait.base.msg_done {
                    if let Some(value) = wait.outcome.take() {
                        return Ok(value);
                    }
                }
            }

            // Only give up once a check at or past the deadline found nothing.
            if let Some((at, limit)) = deadline {
                if !ready && Instant::now() >= at {
                    debug!(ifname = %self.device.name, pipe = id, ?limit, "wait timed out");
                    return Err(Error::Timeout(limit));
                }
            }
        }
    }

    /// Block until the device reports a state change; returns `(old, new)`.
    pub fn wait_for_state_change(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<(DeviceState, DeviceState)> {
        self.wait_for(MSG_PIPE_ID, timeout, |n| match n {
            Notification::StateChange { old, new, .. } => Some((*old, *new)),
            _ => None,
        })
    }

    /// Block until a driver message arrives on pipe `id` and return it.
    pub fn pipe_msg_read(&mut self, id: PipeId, timeout: Option<Duration>) -> Result<MsgBuffer> {
        self.wait_for(id, timeout, |n| match n {
            Notification::MsgToUser {
                data, pipe_name, ..
            } => Some(MsgBuffer::new(data, pipe_name.clone())),
            _ => None,
        })
    }

    /// Block until a driver message arrives on the control pipe.
    pub fn msg_read(&mut self, timeout: Option<Duration>) -> Result<MsgBuffer> {
        self.pipe_msg_read(MSG_PIPE_ID, timeout)
    }

    /// Block until the kernel answers request `seq`.
    ///
    /// Returns the non-negative result the kernel sent; a negative answer is
    /// [`Error::Kernel`], or [`Error::DeviceGone`] for `-ENODEV`.
    pub fn wait_for_ack(&mut self, seq: u32, timeout: Option<Duration>) -> Result<i32> {
        let code = self.wait_for(MSG_PIPE_ID, timeout, move |n| match n {
            Notification::Ack { seq: acked, error } if *acked == seq => Some(*error),
            _ => None,
        })?;
        match code {
            code if code == -libc::ENODEV => Err(Error::DeviceGone(self.device.name.clone())),
            code if code < 0 => Err(Error::Kernel(code)),
            code => Ok(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleConfig;
    use crate::loopback::{LoopbackKernel, LOOPBACK_FAMILY_ID};
    use wimaxll_frame::wimax::{msg_to_user, state_change_report};

    struct Log {
        base: CbContext,
        kinds: Vec<&'static str>,
    }

    impl CallbackContext for Log {
        fn base(&self) -> &CbContext {
            &self.base
        }

        fn base_mut(&mut self) -> &mut CbContext {
            &mut self.base
        }
    }

    fn log(_: &DeviceInfo, ctx: Option<&mut dyn CallbackContext>, n: &Notification) -> Flow {
        if let Some(log) = ctx.and_then(|c| c.downcast_mut::<Log>()) {
            log.kinds.push(n.kind_name());
        }
        Flow::Continue
    }

    fn setup() -> (LoopbackKernel, Handle) {
        let kernel = LoopbackKernel::new().with_device("wmx0", 4).with_group("diag");
        let handle = Handle::open_with("wmx0", kernel.backend(), HandleConfig::default()).unwrap();
        (kernel, handle)
    }

    fn state_change(kernel: &LoopbackKernel, old: DeviceState, new: DeviceState) {
        kernel
            .notify("msg", &state_change_report(LOOPBACK_FAMILY_ID, 4, old, new))
            .unwrap();
    }

    fn install_log(handle: &mut Handle, id: PipeId) -> (Rc<RefCell<Log>>, Callback) {
        let ctx = Rc::new(RefCell::new(Log {
            base: CbContext::new(),
            kinds: Vec::new(),
        }));
        let callback = Callback::with_context(log, ctx.clone());
        handle.set_callback(id, Some(callback.clone())).unwrap();
        (ctx, callback)
    }

    #[test]
    fn test_queued_state_change_keeps_installed_callback() {
        let (kernel, mut handle) = setup();
        let (_log, installed) = install_log(&mut handle, MSG_PIPE_ID);
        state_change(&kernel, DeviceState::Ready, DeviceState::Scanning);

        let change = handle
            .wait_for_state_change(Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(change, (DeviceState::Ready, DeviceState::Scanning));

        let restored = handle.callback(MSG_PIPE_ID).unwrap().unwrap();
        assert!(restored.same_as(&installed));
    }

    #[test]
    fn test_unmatched_notifications_reach_installed_callback() {
        let (kernel, mut handle) = setup();
        let (log, _) = install_log(&mut handle, MSG_PIPE_ID);
        kernel
            .notify("msg", &msg_to_user(LOOPBACK_FAMILY_ID, 4, None, b"x"))
            .unwrap();
        state_change(&kernel, DeviceState::Scanning, DeviceState::Connecting);
        state_change(&kernel, DeviceState::Connecting, DeviceState::Connected);

        let change = handle
            .wait_for_state_change(Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(change, (DeviceState::Scanning, DeviceState::Connecting));
        assert_eq!(log.borrow().kinds, vec!["msg"]);

        // The second change is still queued for the restored callback.
        handle.pipe_read(MSG_PIPE_ID).unwrap();
        assert_eq!(log.borrow().kinds, vec!["msg", "state-change"]);
    }

    #[test]
    fn test_timeout_restores_callback() {
        let (_kernel, mut handle) = setup();
        let err = handle
            .wait_for_state_change(Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(limit) if limit == Duration::from_millis(20)));
        assert!(handle.callback(MSG_PIPE_ID).unwrap().is_none());

        let (_log, installed) = install_log(&mut handle, MSG_PIPE_ID);
        assert!(handle
            .wait_for_state_change(Some(Duration::from_millis(10)))
            .is_err());
        assert!(handle
            .callback(MSG_PIPE_ID)
            .unwrap()
            .unwrap()
            .same_as(&installed));
    }

    #[test]
    fn test_zero_timeout_takes_queued_state_change() {
        let (kernel, mut handle) = setup();
        state_change(&kernel, DeviceState::Ready, DeviceState::Scanning);

        let change = handle.wait_for_state_change(Some(Duration::ZERO)).unwrap();
        assert_eq!(change, (DeviceState::Ready, DeviceState::Scanning));
        assert!(matches!(
            handle.wait_for_state_change(Some(Duration::ZERO)),
            Err(Error::Timeout(limit)) if limit.is_zero()
        ));
    }

    #[test]
    fn test_busy_installed_callback_keeps_forwarded_frame() {
        let (kernel, mut handle) = setup();
        let (log, installed) = install_log(&mut handle, MSG_PIPE_ID);
        kernel
            .notify("msg", &msg_to_user(LOOPBACK_FAMILY_ID, 4, None, b"x"))
            .unwrap();
        state_change(&kernel, DeviceState::Ready, DeviceState::Scanning);

        let held = log.borrow_mut();
        let err = handle
            .wait_for_state_change(Some(Duration::from_secs(1)))
            .unwrap_err();
        assert!(matches!(err, Error::Busy(_)));
        drop(held);

        assert!(handle
            .callback(MSG_PIPE_ID)
            .unwrap()
            .unwrap()
            .same_as(&installed));
        handle.pipe_read(MSG_PIPE_ID).unwrap();
        assert_eq!(log.borrow().kinds, vec!["msg", "state-change"]);
    }

    #[test]
    fn test_msg_read_returns_payload() {
        let (kernel, mut handle) = setup();
        kernel
            .notify("msg", &msg_to_user(LOOPBACK_FAMILY_ID, 4, Some("msg"), b"payload"))
            .unwrap();
        let buf = handle.msg_read(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(buf.as_bytes(), b"payload");
        assert_eq!(buf.pipe_name(), Some("msg"));
        buf.free();
    }

    #[test]
    fn test_pipe_msg_read_on_named_pipe() {
        let (kernel, mut handle) = setup();
        let diag = handle.open_pipe("diag").unwrap();
        kernel
            .notify("diag", &msg_to_user(LOOPBACK_FAMILY_ID, 7, None, b"other"))
            .unwrap();
        kernel
            .notify("diag", &msg_to_user(LOOPBACK_FAMILY_ID, 4, None, b"mine"))
            .unwrap();
        let buf = handle.pipe_msg_read(diag, Some(Duration::from_secs(1))).unwrap();
        assert_eq!(&buf[..], b"mine");
    }

    #[test]
    fn test_wait_for_ack() {
        let (kernel, mut handle) = setup();
        kernel.ack(8, 0);
        kernel.ack(9, -libc::EINVAL);
        kernel.ack(10, 3);
        assert_eq!(handle.wait_for_ack(8, Some(Duration::from_secs(1))).unwrap(), 0);
        assert!(matches!(
            handle.wait_for_ack(9, Some(Duration::from_secs(1))),
            Err(Error::Kernel(code)) if code == -libc::EINVAL
        ));
        assert_eq!(handle.wait_for_ack(10, Some(Duration::from_secs(1))).unwrap(), 3);
    }

    #[test]
    fn test_device_gone_ends_wait() {
        let (kernel, mut handle) = setup();
        kernel.ack(1, -libc::ENODEV);
        let err = handle
            .wait_for_state_change(Some(Duration::from_secs(1)))
            .unwrap_err();
        assert!(err.is_device_gone());
        assert!(matches!(
            handle.wait_for_state_change(None),
            Err(Error::DeviceGone(_))
        ));
    }
}
