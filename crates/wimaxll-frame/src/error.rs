/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A length field is truncated, inconsistent or points past the buffer.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// The encoded frame would exceed the configured ceiling.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An attribute payload does not fit the 16-bit attribute length field.
    #[error("attribute {kind} too large ({size} bytes, max {max})")]
    AttributeTooLarge { kind: u16, size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
