use std::time::Duration;

use wimaxll_transport::TransportError;

use crate::registry::PipeId;

/// Errors returned by handle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device was removed. Every later call on the handle fails the same way.
    #[error("device {0} is gone")]
    DeviceGone(String),

    /// No network interface with this name exists.
    #[error("no such device: {0}")]
    NoSuchDevice(String),

    /// The family does not advertise a multicast group with this name.
    #[error("no such pipe: {0}")]
    NoSuchPipe(String),

    /// The pipe id is not open on this handle.
    #[error("bad pipe id {0}")]
    BadPipeId(PipeId),

    /// The kernel refused to let this process join the named group.
    #[error("permission denied joining pipe {0}")]
    PermissionDenied(String),

    /// Writes are only accepted on the control pipe.
    #[error("pipe {0} is receive-only")]
    NotWritable(PipeId),

    /// A synchronous wait exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Nothing was pending on the pipe.
    #[error("no frames pending")]
    WouldBlock,

    /// A resource is exhausted or in use.
    #[error("busy: {0}")]
    Busy(&'static str),

    /// The kernel answered a request with a negative errno.
    #[error("kernel returned error {0}")]
    Kernel(i32),

    /// The generic netlink family is not registered (WiMAX stack not loaded).
    #[error("generic netlink family {0:?} not available")]
    FamilyNotFound(String),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] wimaxll_frame::FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::Io(err))
    }
}

impl Error {
    /// The negative POSIX error code for this error.
    pub fn errno(&self) -> i32 {
        let code = match self {
            Self::DeviceGone(_) | Self::NoSuchDevice(_) => libc::ENODEV,
            Self::NoSuchPipe(_) | Self::FamilyNotFound(_) => libc::EPROTONOSUPPORT,
            Self::BadPipeId(_) => libc::EBADF,
            Self::PermissionDenied(_) => libc::EPERM,
            Self::NotWritable(_) => libc::EOPNOTSUPP,
            Self::Timeout(_) => libc::ETIMEDOUT,
            Self::WouldBlock => libc::EAGAIN,
            Self::Busy(_) => libc::EBUSY,
            Self::Kernel(code) => return *code,
            Self::Frame(_) => libc::EBADMSG,
            Self::Transport(err) => match err {
                TransportError::PermissionDenied { .. } => libc::EPERM,
                TransportError::NoSuchDevice(_) => libc::ENODEV,
                TransportError::InvalidName(_) => libc::EINVAL,
                TransportError::Socket(io)
                | TransportError::Bind(io)
                | TransportError::Io(io)
                | TransportError::Membership { source: io, .. } => {
                    io.raw_os_error().unwrap_or(libc::EIO)
                }
            },
        };
        -code
    }

    pub fn is_device_gone(&self) -> bool {
        matches!(self, Self::DeviceGone(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
