//! Generic netlink framing for the WiMAX kernel stack.
//!
//! Every datagram exchanged with the kernel carries one or more frames:
//! - A 16-byte netlink header (length, type, flags, sequence, port)
//! - A 4-byte generic netlink header (command, version)
//! - A list of 4-byte aligned, length-prefixed attributes
//!
//! Decoding never reads past the buffer it is given and never panics on
//! hostile input; bad frames come back as [`FrameError::Malformed`].

pub mod codec;
pub mod ctrl;
pub mod error;
pub mod notification;
pub mod wimax;

pub use codec::{
    align, decode_attributes, decode_message, encode_ack, encode_attributes, encode_message,
    split_datagram, Attribute, Frame, FrameConfig, Frames, GenlMessage, DEFAULT_MAX_FRAME,
    DEFAULT_RECV_BUFFER, GENL_HDRLEN, MAX_ATTR_PAYLOAD, NLA_HDRLEN, NLMSG_HDRLEN,
};
pub use ctrl::{FamilyInfo, McastGroup};
pub use error::{FrameError, Result};
pub use notification::Notification;
pub use wimax::{DeviceState, RfState, RfStatus};
