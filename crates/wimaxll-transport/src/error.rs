/// Errors that can occur in socket operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create the socket.
    #[error("failed to open socket: {0}")]
    Socket(std::io::Error),

    /// Failed to bind the socket to a local address.
    #[error("failed to bind socket: {0}")]
    Bind(std::io::Error),

    /// The kernel refused to let this process join the multicast group.
    #[error("permission denied joining multicast group {group}")]
    PermissionDenied { group: u32 },

    /// Joining the multicast group failed for another reason.
    #[error("failed to join multicast group {group}: {source}")]
    Membership {
        group: u32,
        source: std::io::Error,
    },

    /// The named network interface does not exist.
    #[error("no such network interface: {0}")]
    NoSuchDevice(String),

    /// The interface name cannot be passed to the kernel.
    #[error("invalid interface name: {0:?}")]
    InvalidName(String),

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
