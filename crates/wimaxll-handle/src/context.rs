//! Callbacks and the contexts they carry.
//!
//! A callback is a plain function pointer plus an optional shared context.
//! Application contexts embed a [`CbContext`] and implement
//! [`CallbackContext`]; inside the callback they get their own type back
//! with `downcast_mut` on `dyn CallbackContext`.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use wimaxll_frame::Notification;

use crate::error::{Error, Result};

/// What the dispatch engine does after a callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep draining queued frames.
    Continue,
    /// Return to the caller; remaining frames wait for the next read.
    Stop,
}

/// Result slot of a [`CbContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CbResult {
    #[default]
    Pending,
    Done(i64),
}

/// Read-only view of the device a callback fires for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub ifindex: u32,
}

/// Base context embedded in every application callback context.
#[derive(Debug, Clone, Default)]
pub struct CbContext {
    device: Option<DeviceInfo>,
    result: CbResult,
    pub(crate) msg_done: bool,
    /// Set by a callback that could not handle the frame; the frame goes
    /// back to the pipe and the read fails with `Busy`.
    pub(crate) requeue: bool,
}

impl CbContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_device(device: DeviceInfo) -> Self {
        Self {
            device: Some(device),
            ..Self::default()
        }
    }

    /// Rearm for a new exchange with `device`.
    pub fn init(&mut self, device: &DeviceInfo) {
        self.device = Some(device.clone());
        self.result = CbResult::Pending;
        self.msg_done = false;
        self.requeue = false;
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub fn result(&self) -> CbResult {
        self.result
    }

    /// Record the outcome of the exchange. Only the first call takes effect;
    /// returns whether this call did.
    pub fn set_result(&mut self, value: i64) -> bool {
        match self.result {
            CbResult::Pending => {
                self.result = CbResult::Done(value);
                true
            }
            CbResult::Done(_) => false,
        }
    }

    /// Whether a synchronous wait using this context has completed.
    pub fn is_done(&self) -> bool {
        self.msg_done
    }
}

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A context that can be installed alongside a callback.
pub trait CallbackContext: AsAny {
    fn base(&self) -> &CbContext;
    fn base_mut(&mut self) -> &mut CbContext;
}

impl CallbackContext for CbContext {
    fn base(&self) -> &CbContext {
        self
    }

    fn base_mut(&mut self) -> &mut CbContext {
        self
    }
}

impl<'a> dyn CallbackContext + 'a {
    pub fn downcast_ref<T: CallbackContext + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: CallbackContext + 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Signature of every notification callback.
///
/// Callbacks get the device, not the handle, so they cannot re-enter
/// dispatch on the handle that is calling them.
pub type NotifyFn = fn(&DeviceInfo, Option<&mut dyn CallbackContext>, &Notification) -> Flow;

/// Shared, caller-owned callback context.
pub type ContextRef = Rc<RefCell<dyn CallbackContext>>;

/// A callback function paired with its optional context.
#[derive(Clone)]
pub struct Callback {
    func: NotifyFn,
    ctx: Option<ContextRef>,
}

impl Callback {
    pub fn new(func: NotifyFn) -> Self {
        Self { func, ctx: None }
    }

    pub fn with_context(func: NotifyFn, ctx: ContextRef) -> Self {
        Self {
            func,
            ctx: Some(ctx),
        }
    }

    pub fn func(&self) -> NotifyFn {
        self.func
    }

    pub fn context(&self) -> Option<&ContextRef> {
        self.ctx.as_ref()
    }

    /// Same function and same context instance.
    pub fn same_as(&self, other: &Callback) -> bool {
        let ctx_eq = match (&self.ctx, &other.ctx) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.func as usize == other.func as usize && ctx_eq
    }

    pub(crate) fn invoke(&self, device: &DeviceInfo, notification: &Notification) -> Result<Flow> {
        match &self.ctx {
            None => Ok((self.func)(device, None, notification)),
            Some(ctx) => {
                let mut guard = ctx
                    .try_borrow_mut()
                    .map_err(|_| Error::Busy("callback context already borrowed"))?;
                let flow = (self.func)(device, Some(&mut *guard), notification);
                let base = guard.base_mut();
                if std::mem::take(&mut base.requeue) {
                    return Err(Error::Busy("callback could not take the frame"));
                }
                Ok(flow)
            }
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("func", &(self.func as usize as *const ()))
            .field("has_context", &self.ctx.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct Counter {
        base: CbContext,
        seen: usize,
    }

    impl CallbackContext for Counter {
        fn base(&self) -> &CbContext {
            &self.base
        }

        fn base_mut(&mut self) -> &mut CbContext {
            &mut self.base
        }
    }

    fn count(_: &DeviceInfo, ctx: Option<&mut dyn CallbackContext>, _: &Notification) -> Flow {
        if let Some(counter) = ctx.and_then(|c| c.downcast_mut::<Counter>()) {
            counter.seen += 1;
            counter.base.set_result(counter.seen as i64);
        }
        Flow::Continue
    }

    fn device() -> DeviceInfo {
        DeviceInfo {
            name: "wmx0".into(),
            ifindex: 4,
        }
    }

    fn note() -> Notification {
        Notification::MsgToUser {
            ifindex: Some(4),
            pipe_name: None,
            data: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn test_result_is_single_assignment() {
        let mut ctx = CbContext::for_device(device());
        assert_eq!(ctx.result(), CbResult::Pending);
        assert!(ctx.set_result(3));
        assert!(!ctx.set_result(7));
        assert_eq!(ctx.result(), CbResult::Done(3));

        ctx.init(&device());
        assert_eq!(ctx.result(), CbResult::Pending);
        assert!(!ctx.is_done());
    }

    #[test]
    fn test_invoke_downcasts_context() {
        let counter = Rc::new(RefCell::new(Counter {
            base: CbContext::new(),
            seen: 0,
        }));
        let cb = Callback::with_context(count, counter.clone());

        cb.invoke(&device(), &note()).unwrap();
        cb.invoke(&device(), &note()).unwrap();

        let counter = counter.borrow();
        assert_eq!(counter.seen, 2);
        assert_eq!(counter.base().result(), CbResult::Done(1));
    }

    #[test]
    fn test_invoke_with_borrowed_context_is_busy() {
        let counter = Rc::new(RefCell::new(Counter {
            base: CbContext::new(),
            seen: 0,
        }));
        let cb = Callback::with_context(count, counter.clone());
        let _held = counter.borrow_mut();
        assert!(matches!(cb.invoke(&device(), &note()), Err(Error::Busy(_))));
    }

    #[test]
    fn test_same_as() {
        let ctx: ContextRef = Rc::new(RefCell::new(CbContext::new()));
        let a = Callback::with_context(count, ctx.clone());
        let b = Callback::with_context(count, ctx);
        let c = Callback::with_context(count, Rc::new(RefCell::new(CbContext::new())));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert!(!a.same_as(&Callback::new(count)));
    }
}
