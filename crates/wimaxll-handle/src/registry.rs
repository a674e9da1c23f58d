use std::collections::VecDeque;
use std::io::ErrorKind;

use bytes::Bytes;
use tracing::warn;
use wimaxll_frame::codec::split_datagram;
use wimaxll_frame::McastGroup;
use wimaxll_transport::PipeSocket;

use crate::context::Callback;
use crate::error::{Error, Result};

/// Pipe identifier within one handle.
pub type PipeId = u32;

/// The control pipe. Always open while the handle is.
pub const MSG_PIPE_ID: PipeId = 0;

/// Default number of named pipes a handle can hold at once.
pub const DEFAULT_MAX_PIPES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeKind {
    /// Bidirectional: requests go out, acks and broadcasts come in.
    Control,
    /// Receive-only multicast group.
    Multicast,
}

#[derive(Debug)]
pub(crate) struct Pipe {
    pub name: String,
    pub kind: PipeKind,
    pub group: McastGroup,
    pub socket: PipeSocket,
    pub callback: Option<Callback>,
    /// Frames already received but not yet dispatched.
    pub backlog: VecDeque<Bytes>,
}

impl Pipe {
    pub fn new(kind: PipeKind, group: McastGroup, socket: PipeSocket) -> Self {
        Self {
            name: group.name.clone(),
            kind,
            group,
            socket,
            callback: None,
            backlog: VecDeque::new(),
        }
    }

    /// Next undispatched frame: backlog first, then the socket.
    ///
    /// Returns `Ok(None)` once nothing is immediately available. A datagram
    /// whose framing breaks part way keeps the frames before the break.
    pub fn next_frame(&mut self, buf: &mut [u8]) -> std::io::Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.backlog.pop_front() {
                return Ok(Some(frame));
            }

            let n = match self.socket.recv(buf) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(err) => return Err(err),
            };
            for frame in split_datagram(Bytes::copy_from_slice(&buf[..n])) {
                match frame {
                    Ok(frame) => self.backlog.push_back(frame),
                    Err(err) => warn!(pipe = %self.name, %err, "dropping malformed datagram tail"),
                }
            }
        }
    }
}

/// Slot table of a handle's pipes. Slot 0 holds the control pipe.
#[derive(Debug)]
pub(crate) struct PipeRegistry {
    slots: Vec<Option<Pipe>>,
    max_pipes: usize,
}

impl PipeRegistry {
    /// Build the registry around the control pipe.
    pub fn new(group: McastGroup, socket: PipeSocket, max_pipes: usize) -> Self {
        Self {
            slots: vec![Some(Pipe::new(PipeKind::Control, group, socket))],
            max_pipes,
        }
    }

    pub fn get(&self, id: PipeId) -> Result<&Pipe> {
        self.slots
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::BadPipeId(id))
    }

    pub fn get_mut(&mut self, id: PipeId) -> Result<&mut Pipe> {
        self.slots
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::BadPipeId(id))
    }

    /// Id the next named pipe would get.
    pub fn free_slot(&self) -> Result<PipeId> {
        let reused = self
            .slots
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, slot)| slot.is_none())
            .map(|(i, _)| i);
        match reused {
            Some(i) => Ok(i as PipeId),
            None if self.slots.len() <= self.max_pipes => Ok(self.slots.len() as PipeId),
            None => Err(Error::Busy("all pipe slots in use")),
        }
    }

    pub fn insert(&mut self, pipe: Pipe) -> Result<PipeId> {
        let id = self.free_slot()?;
        let index = id as usize;
        if index == self.slots.len() {
            self.slots.push(Some(pipe));
        } else {
            self.slots[index] = Some(pipe);
        }
        Ok(id)
    }

    /// Remove a named pipe. The control pipe cannot be removed.
    pub fn remove(&mut self, id: PipeId) -> Result<Pipe> {
        if id == MSG_PIPE_ID {
            return Err(Error::BadPipeId(id));
        }
        self.slots
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or(Error::BadPipeId(id))
    }

    /// Ids of every open pipe, control pipe first.
    pub fn ids(&self) -> Vec<PipeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| i as PipeId)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, id: u32) -> McastGroup {
        McastGroup {
            name: name.into(),
            id,
        }
    }

    fn socket() -> PipeSocket {
        PipeSocket::loopback_pair().unwrap().0
    }

    #[test]
    fn test_control_pipe_in_slot_zero() {
        let registry = PipeRegistry::new(group("msg", 1), socket(), 4);
        assert_eq!(registry.get(MSG_PIPE_ID).unwrap().kind, PipeKind::Control);
        assert_eq!(registry.ids(), vec![0]);
    }

    #[test]
    fn test_control_pipe_cannot_be_removed() {
        let mut registry = PipeRegistry::new(group("msg", 1), socket(), 4);
        assert!(matches!(registry.remove(0), Err(Error::BadPipeId(0))));
        assert!(registry.get(0).is_ok());
    }

    #[test]
    fn test_slots_are_reused_and_bounded() {
        let mut registry = PipeRegistry::new(group("msg", 1), socket(), 2);
        let a = registry
            .insert(Pipe::new(PipeKind::Multicast, group("a", 2), socket()))
            .unwrap();
        let b = registry
            .insert(Pipe::new(PipeKind::Multicast, group("b", 3), socket()))
            .unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(matches!(
            registry.insert(Pipe::new(PipeKind::Multicast, group("c", 4), socket())),
            Err(Error::Busy(_))
        ));

        registry.remove(a).unwrap();
        assert!(matches!(registry.remove(a), Err(Error::BadPipeId(1))));
        let c = registry
            .insert(Pipe::new(PipeKind::Multicast, group("c", 4), socket()))
            .unwrap();
        assert_eq!(c, 1);
        assert_eq!(registry.get(c).unwrap().name, "c");
    }
}
