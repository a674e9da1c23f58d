use bytes::Bytes;

use crate::codec::{decode_message, Frame, GenlMessage};
use crate::error::{FrameError, Result};
use crate::wimax::{attr, op, DeviceState};

/// A decoded event from the WiMAX family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Driver message for user space; `data` is the payload with the
    /// envelope stripped.
    MsgToUser {
        ifindex: Option<u32>,
        pipe_name: Option<String>,
        data: Bytes,
    },
    /// The device moved from `old` to `new`.
    StateChange {
        ifindex: Option<u32>,
        old: DeviceState,
        new: DeviceState,
    },
    /// Reply to a request: 0 or a positive result, or a negative errno.
    Ack { seq: u32, error: i32 },
    /// A command this library does not interpret.
    Other { cmd: u8, ifindex: Option<u32> },
}

impl Notification {
    /// Interpret a frame received from the WiMAX family.
    ///
    /// Returns `Ok(None)` for netlink control frames and for messages of
    /// other families.
    pub fn from_frame(frame: &Frame, family_id: u16) -> Result<Option<Self>> {
        match frame {
            Frame::Ack { seq, error, .. } => Ok(Some(Self::Ack {
                seq: *seq,
                error: *error,
            })),
            Frame::Control { .. } => Ok(None),
            Frame::Genl(msg) if msg.family != family_id => Ok(None),
            Frame::Genl(msg) => Self::from_message(msg).map(Some),
        }
    }

    /// Decode raw bytes straight into a notification.
    pub fn decode(raw: &Bytes, family_id: u16) -> Result<Option<Self>> {
        Self::from_frame(&decode_message(raw)?, family_id)
    }

    fn from_message(msg: &GenlMessage) -> Result<Self> {
        match msg.cmd {
            op::MSG_TO_USER => {
                let data = msg
                    .attr(attr::MSG_DATA)
                    .ok_or(FrameError::Malformed("message without data attribute"))?
                    .payload
                    .clone();
                let pipe_name = msg
                    .attr(attr::MSG_PIPE_NAME)
                    .map(|a| a.as_str().map(str::to_owned))
                    .transpose()?;
                Ok(Self::MsgToUser {
                    ifindex: ifindex_attr(msg, attr::MSG_IFIDX)?,
                    pipe_name,
                    data,
                })
            }
            op::RE_STATE_CHANGE => {
                let old = msg
                    .attr(attr::STCH_STATE_OLD)
                    .ok_or(FrameError::Malformed("state change without old state"))?;
                let new = msg
                    .attr(attr::STCH_STATE_NEW)
                    .ok_or(FrameError::Malformed("state change without new state"))?;
                Ok(Self::StateChange {
                    ifindex: ifindex_attr(msg, attr::STCH_IFIDX)?,
                    old: DeviceState::from_attr(old)?,
                    new: DeviceState::from_attr(new)?,
                })
            }
            cmd => {
                tracing::trace!(cmd, "uninterpreted WiMAX command");
                // Every WiMAX command carries the interface index as attribute 1.
                Ok(Self::Other {
                    cmd,
                    ifindex: ifindex_attr(msg, attr::MSG_IFIDX)?,
                })
            }
        }
    }

    /// Interface index the event refers to, when it names one.
    pub fn ifindex(&self) -> Option<u32> {
        match self {
            Self::MsgToUser { ifindex, .. }
            | Self::StateChange { ifindex, .. }
            | Self::Other { ifindex, .. } => *ifindex,
            Self::Ack { .. } => None,
        }
    }

    /// Whether the event is addressed to `ifindex` (or to nobody in particular).
    pub fn concerns(&self, ifindex: u32) -> bool {
        self.ifindex().is_none_or(|idx| idx == ifindex)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::MsgToUser { .. } => "msg",
            Self::StateChange { .. } => "state-change",
            Self::Ack { .. } => "ack",
            Self::Other { .. } => "other",
        }
    }
}

fn ifindex_attr(msg: &GenlMessage, kind: u16) -> Result<Option<u32>> {
    msg.attr(kind).map(|a| a.as_u32()).transpose()
}
