//! User-space control and notification library for the Linux WiMAX stack.
//!
//! Open a [`Handle`] on a device, open named pipes, install callbacks or
//! block on the `wait_*` helpers, and drive readiness from your own event
//! loop.
//!
//! # Crate Structure
//!
//! - [`transport`]: Netlink and loopback sockets, readiness waits
//! - [`frame`]: Generic netlink framing and typed WiMAX notifications
//! - [`handle`]: Device handles, pipes, dispatch and synchronous waits

/// Re-export transport types.
pub mod transport {
    pub use wimaxll_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wimaxll_frame::*;
}

/// Re-export handle types.
pub mod handle {
    pub use wimaxll_handle::*;
}

pub use wimaxll_handle::{
    Callback, CallbackContext, CbContext, CbResult, DeviceInfo, DeviceState, Error, Flow, Handle,
    HandleConfig, MsgBuffer, Notification, PipeId, Result, RfState, RfStatus, MSG_PIPE_ID,
};
