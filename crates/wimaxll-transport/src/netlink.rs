use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use tracing::debug;

use crate::error::{Result, TransportError};

/// Netlink protocol number for generic netlink.
pub const NETLINK_GENERIC: libc::c_int = libc::NETLINK_GENERIC;

/// A non-blocking `AF_NETLINK` datagram socket.
///
/// The socket is bound with a kernel-assigned port id and sends every
/// datagram to the kernel (port 0). Multicast groups are joined with
/// [`NetlinkSocket::add_membership`].
pub struct NetlinkSocket {
    fd: OwnedFd,
    port_id: u32,
    protocol: libc::c_int,
}

impl NetlinkSocket {
    /// Open and bind a netlink socket for `protocol`.
    pub fn open(protocol: libc::c_int) -> Result<Self> {
        // SAFETY: plain socket(2) call; the returned descriptor is checked below.
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                protocol,
            )
        };
        if raw < 0 {
            return Err(TransportError::Socket(std::io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut addr = kernel_addr();
        let mut len = std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;

        // SAFETY: `addr` is a valid sockaddr_nl and `len` matches its size.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_nl).cast::<libc::sockaddr>(),
                len,
            )
        };
        if rc < 0 {
            return Err(TransportError::Bind(std::io::Error::last_os_error()));
        }

        // SAFETY: `addr`/`len` are valid writable locations of the advertised size.
        let rc = unsafe {
            libc::getsockname(
                fd.as_raw_fd(),
                (&mut addr as *mut libc::sockaddr_nl).cast::<libc::sockaddr>(),
                &mut len,
            )
        };
        if rc < 0 {
            return Err(TransportError::Bind(std::io::Error::last_os_error()));
        }

        debug!(port_id = addr.nl_pid, protocol, "opened netlink socket");

        Ok(Self {
            fd,
            port_id: addr.nl_pid,
            protocol,
        })
    }

    /// Join a multicast group so its broadcasts are queued on this socket.
    pub fn add_membership(&self, group: u32) -> Result<()> {
        // SAFETY: `group` is a valid u32 for the duration of the call and the
        // length passed matches its size.
        let rc = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_NETLINK,
                libc::NETLINK_ADD_MEMBERSHIP,
                (&group as *const u32).cast::<libc::c_void>(),
                std::mem::size_of::<u32>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EPERM) | Some(libc::EACCES) => {
                    Err(TransportError::PermissionDenied { group })
                }
                _ => Err(TransportError::Membership { group, source: err }),
            };
        }
        debug!(port_id = self.port_id, group, "joined multicast group");
        Ok(())
    }

    /// Send one datagram to the kernel.
    pub fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        let addr = kernel_addr();
        // SAFETY: `buf` is valid for `buf.len()` bytes and `addr` is a valid
        // sockaddr_nl of the advertised length.
        let rc = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                0,
                (&addr as *const libc::sockaddr_nl).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rc as usize)
    }

    /// Receive one datagram without blocking.
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        // SAFETY: `buf` is valid and exclusively borrowed for `buf.len()` bytes.
        let rc = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
                libc::MSG_DONTWAIT,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(rc as usize)
    }

    /// Kernel-assigned port id of this socket.
    pub fn port_id(&self) -> u32 {
        self.port_id
    }

    /// Netlink protocol this socket speaks.
    pub fn protocol(&self) -> libc::c_int {
        self.protocol
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for NetlinkSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl std::fmt::Debug for NetlinkSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetlinkSocket")
            .field("fd", &self.fd.as_raw_fd())
            .field("port_id", &self.port_id)
            .field("protocol", &self.protocol)
            .finish()
    }
}

fn kernel_addr() -> libc::sockaddr_nl {
    // SAFETY: sockaddr_nl is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
    addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
    addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_generic_socket_gets_port_id() {
        // Sandboxes without netlink support refuse the socket; nothing to test there.
        let Ok(socket) = NetlinkSocket::open(NETLINK_GENERIC) else {
            return;
        };
        assert_ne!(socket.port_id(), 0);
        assert_eq!(socket.protocol(), NETLINK_GENERIC);
        assert!(socket.as_raw_fd() >= 0);
    }

    #[test]
    fn recv_on_idle_socket_would_block() {
        let Ok(socket) = NetlinkSocket::open(NETLINK_GENERIC) else {
            return;
        };
        let mut buf = [0u8; 64];
        let err = socket.recv(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    }
}
