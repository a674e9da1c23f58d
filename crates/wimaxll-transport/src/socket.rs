use std::io::ErrorKind;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::net::UnixDatagram;

#[cfg(target_os = "linux")]
use crate::netlink::NetlinkSocket;

/// A connected datagram socket backing one pipe.
///
/// Every send and receive moves whole datagrams; receives never block.
/// On Linux this wraps a generic netlink socket. The loopback variant wraps
/// one end of a `UnixDatagram` pair whose other end plays the kernel.
pub struct PipeSocket {
    inner: PipeSocketInner,
}

enum PipeSocketInner {
    #[cfg(target_os = "linux")]
    Netlink(NetlinkSocket),
    Loopback(UnixDatagram),
}

impl PipeSocket {
    /// Wrap an open netlink socket.
    #[cfg(target_os = "linux")]
    pub fn from_netlink(socket: NetlinkSocket) -> Self {
        Self {
            inner: PipeSocketInner::Netlink(socket),
        }
    }

    /// Wrap one end of a datagram pair, switching it to non-blocking mode.
    pub fn from_loopback(socket: UnixDatagram) -> std::io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            inner: PipeSocketInner::Loopback(socket),
        })
    }

    /// Create a loopback pipe socket plus the peer end that stands in for the kernel.
    pub fn loopback_pair() -> std::io::Result<(Self, UnixDatagram)> {
        let (local, peer) = UnixDatagram::pair()?;
        Ok((Self::from_loopback(local)?, peer))
    }

    /// Send one datagram to the kernel.
    pub fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        loop {
            let res = match &self.inner {
                #[cfg(target_os = "linux")]
                PipeSocketInner::Netlink(socket) => socket.send(buf),
                PipeSocketInner::Loopback(socket) => socket.send(buf),
            };
            match res {
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    /// Receive one datagram without blocking.
    ///
    /// Returns `ErrorKind::WouldBlock` when nothing is queued.
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            let res = match &self.inner {
                #[cfg(target_os = "linux")]
                PipeSocketInner::Netlink(socket) => socket.recv(buf),
                PipeSocketInner::Loopback(socket) => socket.recv(buf),
            };
            match res {
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(target_os = "linux")]
            PipeSocketInner::Netlink(_) => "generic-netlink",
            PipeSocketInner::Loopback(_) => "loopback",
        }
    }
}

impl AsRawFd for PipeSocket {
    fn as_raw_fd(&self) -> RawFd {
        match &self.inner {
            #[cfg(target_os = "linux")]
            PipeSocketInner::Netlink(socket) => socket.as_raw_fd(),
            PipeSocketInner::Loopback(socket) => socket.as_raw_fd(),
        }
    }
}

impl AsFd for PipeSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            PipeSocketInner::Netlink(socket) => socket.as_fd(),
            PipeSocketInner::Loopback(socket) => socket.as_fd(),
        }
    }
}

impl std::fmt::Debug for PipeSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeSocket")
            .field("type", &self.transport_name())
            .field("fd", &self.as_raw_fd())
            .finish()
    }
}
