//! WiMAX device handles.
//!
//! A [`Handle`] is one open session with one WiMAX device. It owns:
//! - The control pipe (id 0), joined to the family's `msg` group
//! - Any number of named multicast pipes, each with its own socket
//! - At most one [`Callback`] per pipe
//!
//! The library never spawns threads and never runs an event loop. Callers
//! poll the descriptors returned by [`Handle::pipe_fd`] and call
//! [`Handle::pipe_read`] when one becomes readable. The `wait_*` helpers
//! and the device control requests block on a single descriptor.

pub mod backend;
pub mod buffer;
pub mod context;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod loopback;
pub mod registry;
pub mod wait;

pub use backend::{Backend, Binding};
#[cfg(target_os = "linux")]
pub use backend::GenlBackend;
pub use buffer::MsgBuffer;
pub use context::{
    CallbackContext, Callback, CbContext, CbResult, ContextRef, DeviceInfo, Flow, NotifyFn,
};
pub use error::{Error, Result};
pub use handle::{Handle, HandleConfig, DEFAULT_REQUEST_TIMEOUT};
pub use loopback::{LoopbackBackend, LoopbackKernel};
pub use registry::{PipeId, PipeKind, DEFAULT_MAX_PIPES, MSG_PIPE_ID};

pub use wimaxll_frame::{DeviceState, Notification, RfState, RfStatus};
