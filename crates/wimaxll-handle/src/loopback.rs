//! In-process stand-in for the kernel WiMAX stack.
//!
//! [`LoopbackKernel`] owns the kernel end of every socket a
//! [`LoopbackBackend`] hands out. Tests and demos use it to broadcast
//! notifications, acknowledge requests and read what the handle sent.

use std::cell::RefCell;
use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};
use wimaxll_frame::codec::encode_ack;
use wimaxll_frame::wimax::{FAMILY_NAME, GNL_VERSION, MSG_PIPE_NAME};
use wimaxll_frame::{decode_message, FamilyInfo, Frame, GenlMessage, McastGroup, DEFAULT_MAX_FRAME};
use wimaxll_transport::PipeSocket;

use crate::backend::{Backend, Binding};
use crate::error::{Error, Result};

/// Family id the loopback kernel assigns to the WiMAX family.
pub const LOOPBACK_FAMILY_ID: u16 = 0x20;

struct Subscriber {
    group: u32,
    socket: UnixDatagram,
}

struct KernelState {
    family: FamilyInfo,
    devices: Vec<(String, u32)>,
    restricted: Vec<u32>,
    subscribers: Vec<Subscriber>,
}

/// Shared handle on the loopback kernel. Clones refer to the same kernel.
#[derive(Clone)]
pub struct LoopbackKernel {
    state: Rc<RefCell<KernelState>>,
}

impl Default for LoopbackKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackKernel {
    /// A kernel exposing the WiMAX family with only the `msg` group.
    pub fn new() -> Self {
        let family = FamilyInfo {
            id: LOOPBACK_FAMILY_ID,
            name: FAMILY_NAME.to_string(),
            version: u32::from(GNL_VERSION),
            groups: vec![McastGroup {
                name: MSG_PIPE_NAME.to_string(),
                id: 1,
            }],
        };
        Self {
            state: Rc::new(RefCell::new(KernelState {
                family,
                devices: Vec::new(),
                restricted: Vec::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register a network interface.
    pub fn with_device(self, name: &str, ifindex: u32) -> Self {
        self.state
            .borrow_mut()
            .devices
            .push((name.to_string(), ifindex));
        self
    }

    /// Advertise another multicast group.
    pub fn with_group(self, name: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = state.family.groups.iter().map(|g| g.id).max().unwrap_or(0) + 1;
            state.family.groups.push(McastGroup {
                name: name.to_string(),
                id,
            });
        }
        self
    }

    /// Advertise a group that refuses every join.
    pub fn with_restricted_group(self, name: &str) -> Self {
        let kernel = self.with_group(name);
        {
            let mut state = kernel.state.borrow_mut();
            if let Some(id) = state.family.group(name).map(|g| g.id) {
                state.restricted.push(id);
            }
        }
        kernel
    }

    /// A backend serving handles from this kernel.
    pub fn backend(&self) -> LoopbackBackend {
        LoopbackBackend {
            kernel: self.clone(),
        }
    }

    pub fn family(&self) -> FamilyInfo {
        self.state.borrow().family.clone()
    }

    /// Number of live sockets joined to `group`.
    pub fn subscribers(&self, group: &str) -> usize {
        let state = self.state.borrow();
        match state.family.group(group) {
            Some(g) => state.subscribers.iter().filter(|s| s.group == g.id).count(),
            None => 0,
        }
    }

    /// Deliver raw bytes to every socket joined to `group`.
    ///
    /// Returns how many sockets got the datagram. Sockets whose handle side
    /// was closed are forgotten.
    pub fn broadcast(&self, group: &str, datagram: &[u8]) -> usize {
        let mut state = self.state.borrow_mut();
        let Some(id) = state.family.group(group).map(|g| g.id) else {
            return 0;
        };

        let mut delivered = 0;
        state.subscribers.retain(|sub| {
            if sub.group != id {
                return true;
            }
            match sub.socket.send(datagram) {
                Ok(_) => {
                    delivered += 1;
                    true
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    warn!(group, "loopback subscriber queue full; datagram dropped");
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    /// Encode `msg` and broadcast it to `group`.
    pub fn notify(&self, group: &str, msg: &GenlMessage) -> Result<usize> {
        let wire = msg.encode(DEFAULT_MAX_FRAME)?;
        Ok(self.broadcast(group, &wire))
    }

    /// Answer request `seq` with `error` (0, a result, or a negative errno).
    ///
    /// The ack reaches every control pipe, so it can be queued before the
    /// request is sent.
    pub fn ack(&self, seq: u32, error: i32) -> usize {
        let mut buf = BytesMut::new();
        encode_ack(seq, 0, error, &mut buf);
        self.broadcast(MSG_PIPE_NAME, &buf)
    }

    /// Next request any handle sent, if one is queued.
    pub fn recv_request(&self) -> Result<Option<GenlMessage>> {
        let state = self.state.borrow();
        let mut buf = vec![0u8; DEFAULT_MAX_FRAME];
        for sub in &state.subscribers {
            match sub.socket.recv(&mut buf) {
                Ok(n) => {
                    if let Frame::Genl(msg) = decode_message(&Bytes::copy_from_slice(&buf[..n]))? {
                        return Ok(Some(msg));
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }
}

/// Backend handing out loopback sockets from a [`LoopbackKernel`].
#[derive(Clone)]
pub struct LoopbackBackend {
    kernel: LoopbackKernel,
}

impl Backend for LoopbackBackend {
    fn bind(&mut self, ifname: &str, family_name: &str) -> Result<Binding> {
        let state = self.kernel.state.borrow();
        let ifindex = state
            .devices
            .iter()
            .find(|(name, _)| name == ifname)
            .map(|(_, index)| *index)
            .ok_or_else(|| Error::NoSuchDevice(ifname.to_string()))?;
        if state.family.name != family_name {
            return Err(Error::FamilyNotFound(family_name.to_string()));
        }
        Ok(Binding {
            ifindex,
            family: state.family.clone(),
        })
    }

    fn open_socket(&mut self, group: &McastGroup) -> Result<PipeSocket> {
        let mut state = self.kernel.state.borrow_mut();
        if state.restricted.contains(&group.id) {
            return Err(Error::PermissionDenied(group.name.clone()));
        }

        let (socket, peer) = PipeSocket::loopback_pair()?;
        peer.set_nonblocking(true)?;
        state.subscribers.push(Subscriber {
            group: group.id,
            socket: peer,
        });
        debug!(group = %group.name, "loopback socket joined group");
        Ok(socket)
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
