//! Where a handle's sockets come from.
//!
//! [`GenlBackend`] talks to the kernel over generic netlink.
//! [`LoopbackBackend`](crate::loopback::LoopbackBackend) serves the same
//! requests from an in-process kernel stand-in.

use wimaxll_frame::{FamilyInfo, McastGroup};
use wimaxll_transport::PipeSocket;

use crate::error::Result;

/// Outcome of binding a handle to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub ifindex: u32,
    pub family: FamilyInfo,
}

/// Source of device resolution and pipe sockets.
pub trait Backend {
    /// Resolve the interface index of `ifname` and the family `family_name`.
    fn bind(&mut self, ifname: &str, family_name: &str) -> Result<Binding>;

    /// Open a socket joined to `group`.
    fn open_socket(&mut self, group: &McastGroup) -> Result<PipeSocket>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

#[cfg(target_os = "linux")]
pub use genl::GenlBackend;

#[cfg(target_os = "linux")]
mod genl {
    use std::io::ErrorKind;
    use std::os::fd::AsRawFd;
    use std::time::{Duration, Instant};

    use bytes::Bytes;
    use tracing::{debug, warn};
    use wimaxll_frame::ctrl::get_family_request;
    use wimaxll_frame::{decode_message, split_datagram, FamilyInfo, Frame, FrameConfig, McastGroup};
    use wimaxll_transport::netlink::NETLINK_GENERIC;
    use wimaxll_transport::{
        interface_index, wait_readable, NetlinkSocket, PipeSocket, TransportError,
    };

    use super::{Backend, Binding};
    use crate::error::{Error, Result};

    /// How long the controller gets to describe a family.
    const RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Generic netlink backend: the real kernel.
    #[derive(Debug, Clone, Default)]
    pub struct GenlBackend {
        frame: FrameConfig,
    }

    impl GenlBackend {
        pub fn new(frame: FrameConfig) -> Self {
            Self { frame }
        }

        fn resolve_family(&self, name: &str) -> Result<FamilyInfo> {
            const SEQ: u32 = 1;

            let socket = NetlinkSocket::open(NETLINK_GENERIC)?;
            let request = get_family_request(name, SEQ).encode(self.frame.max_frame_size)?;
            socket.send(&request)?;

            let deadline = Instant::now() + RESOLVE_TIMEOUT;
            let mut buf = vec![0u8; self.frame.recv_buffer_size];
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(Error::Timeout(RESOLVE_TIMEOUT));
                }
                if !wait_readable(socket.as_raw_fd(), Some(remaining))? {
                    continue;
                }

                let n = match socket.recv(&mut buf) {
                    Ok(n) => n,
                    Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                    Err(err) => return Err(err.into()),
                };
                for raw in split_datagram(Bytes::copy_from_slice(&buf[..n])) {
                    match decode_message(&raw?)? {
                        Frame::Genl(msg) if msg.seq == SEQ => {
                            return Ok(FamilyInfo::from_message(&msg)?);
                        }
                        Frame::Ack { seq, error, .. } if seq == SEQ && error < 0 => {
                            return Err(if error == -libc::ENOENT {
                                Error::FamilyNotFound(name.to_string())
                            } else {
                                Error::Kernel(error)
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    impl Backend for GenlBackend {
        fn bind(&mut self, ifname: &str, family_name: &str) -> Result<Binding> {
            let ifindex = interface_index(ifname).map_err(|err| match err {
                TransportError::NoSuchDevice(name) => Error::NoSuchDevice(name),
                other => other.into(),
            })?;
            let family = self.resolve_family(family_name)?;
            debug!(
                ifname,
                ifindex,
                family = family.id,
                groups = family.groups.len(),
                "resolved generic netlink family"
            );
            Ok(Binding { ifindex, family })
        }

        fn open_socket(&mut self, group: &McastGroup) -> Result<PipeSocket> {
            let socket = NetlinkSocket::open(NETLINK_GENERIC)?;
            socket.add_membership(group.id).map_err(|err| match err {
                TransportError::PermissionDenied { .. } => {
                    warn!(group = %group.name, "kernel refused multicast membership");
                    Error::PermissionDenied(group.name.clone())
                }
                other => other.into(),
            })?;
            Ok(PipeSocket::from_netlink(socket))
        }

        fn name(&self) -> &'static str {
            "generic-netlink"
        }
    }
}
