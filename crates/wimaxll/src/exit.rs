use std::fmt;
use std::io;

use wimaxll_frame::FrameError;
use wimaxll_handle::Error;
use wimaxll_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
/// Device missing, removed, or the kernel WiMAX stack is not loaded.
pub const NO_DEVICE: i32 = 69;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => NO_DEVICE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Socket(source) | TransportError::Io(source) => io_error(context, source),
        TransportError::PermissionDenied { .. } => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::NoSuchDevice(_) => CliError::new(NO_DEVICE, format!("{context}: {err}")),
        TransportError::InvalidName(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::FrameTooLarge { .. } | FrameError::AttributeTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::Malformed(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn handle_error(context: &str, err: Error) -> CliError {
    match err {
        Error::Transport(err) => transport_error(context, err),
        Error::Frame(err) => frame_error(context, err),
        Error::DeviceGone(_) | Error::NoSuchDevice(_) | Error::FamilyNotFound(_) => {
            CliError::new(NO_DEVICE, format!("{context}: {err}"))
        }
        Error::PermissionDenied(_) => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        Error::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        Error::NoSuchPipe(_) | Error::BadPipeId(_) | Error::NotWritable(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        Error::Kernel(_) | Error::Busy(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
