use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Netlink header: length (4) + type (2) + flags (2) + sequence (4) + port (4).
pub const NLMSG_HDRLEN: usize = 16;

/// Generic netlink header: command (1) + version (1) + reserved (2).
pub const GENL_HDRLEN: usize = 4;

/// Attribute header: length (2) + type (2).
pub const NLA_HDRLEN: usize = 4;

/// Largest attribute payload the 16-bit length field can describe.
pub const MAX_ATTR_PAYLOAD: usize = u16::MAX as usize - NLA_HDRLEN;

/// Default ceiling for frames this side encodes: 16 KiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024;

/// Default receive buffer: large enough for any generic netlink datagram.
pub const DEFAULT_RECV_BUFFER: usize = 32 * 1024;

pub const NLMSG_NOOP: u16 = 0x1;
pub const NLMSG_ERROR: u16 = 0x2;
pub const NLMSG_DONE: u16 = 0x3;
pub const NLMSG_OVERRUN: u16 = 0x4;
/// Types below this value are reserved for netlink control messages.
pub const NLMSG_MIN_TYPE: u16 = 0x10;

pub const NLM_F_REQUEST: u16 = 0x1;
pub const NLM_F_MULTI: u16 = 0x2;
pub const NLM_F_ACK: u16 = 0x4;

pub const NLA_F_NESTED: u16 = 0x8000;
pub const NLA_F_NET_BYTEORDER: u16 = 0x4000;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Round `len` up to the 4-byte netlink alignment.
pub const fn align(len: usize) -> usize {
    (len + 3) & !3
}

/// One typed, length-prefixed attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Raw attribute type, including the nested/byte-order flag bits.
    pub kind: u16,
    /// Attribute payload (padding excluded).
    pub payload: Bytes,
}

impl Attribute {
    pub fn new(kind: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn u8(kind: u16, value: u8) -> Self {
        Self::new(kind, vec![value])
    }

    pub fn u16(kind: u16, value: u16) -> Self {
        Self::new(kind, value.to_ne_bytes().to_vec())
    }

    pub fn u32(kind: u16, value: u32) -> Self {
        Self::new(kind, value.to_ne_bytes().to_vec())
    }

    /// A NUL-terminated string attribute.
    pub fn string(kind: u16, value: &str) -> Self {
        let mut buf = Vec::with_capacity(value.len() + 1);
        buf.extend_from_slice(value.as_bytes());
        buf.push(0);
        Self::new(kind, buf)
    }

    /// A nested attribute holding `children`.
    pub fn nested(kind: u16, children: &[Attribute]) -> Result<Self> {
        let mut buf = BytesMut::new();
        encode_attributes(children, &mut buf)?;
        Ok(Self::new(kind | NLA_F_NESTED, buf.freeze()))
    }

    /// Attribute type with the flag bits masked off.
    pub fn kind(&self) -> u16 {
        self.kind & NLA_TYPE_MASK
    }

    pub fn is_nested(&self) -> bool {
        self.kind & NLA_F_NESTED != 0
    }

    pub fn as_u8(&self) -> Result<u8> {
        self.payload
            .first()
            .copied()
            .ok_or(FrameError::Malformed("u8 attribute is empty"))
    }

    pub fn as_u16(&self) -> Result<u16> {
        let bytes = self
            .payload
            .get(..2)
            .ok_or(FrameError::Malformed("u16 attribute too short"))?;
        Ok(u16::from_ne_bytes([bytes[0], bytes[1]]))
    }

    pub fn as_u32(&self) -> Result<u32> {
        let bytes = self
            .payload
            .get(..4)
            .ok_or(FrameError::Malformed("u32 attribute too short"))?;
        Ok(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// String payload with trailing NULs stripped.
    pub fn as_str(&self) -> Result<&str> {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        std::str::from_utf8(&self.payload[..end])
            .map_err(|_| FrameError::Malformed("string attribute is not UTF-8"))
    }

    /// Decode the payload as a list of nested attributes.
    pub fn children(&self) -> Result<Vec<Attribute>> {
        decode_attributes(&self.payload)
    }

    /// Size on the wire, padding included.
    pub fn wire_size(&self) -> usize {
        align(NLA_HDRLEN + self.payload.len())
    }
}

/// A generic netlink message: netlink header fields, command and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenlMessage {
    /// Generic netlink family id (the netlink message type).
    pub family: u16,
    pub flags: u16,
    pub seq: u32,
    pub port: u32,
    pub cmd: u8,
    pub version: u8,
    pub attrs: Vec<Attribute>,
}

impl GenlMessage {
    pub fn new(family: u16, cmd: u8, version: u8) -> Self {
        Self {
            family,
            flags: 0,
            seq: 0,
            port: 0,
            cmd,
            version,
            attrs: Vec::new(),
        }
    }

    /// A request that asks the kernel for an acknowledgement.
    pub fn request(family: u16, cmd: u8, version: u8) -> Self {
        Self {
            flags: NLM_F_REQUEST | NLM_F_ACK,
            ..Self::new(family, cmd, version)
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    pub fn with_attr(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn push(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    /// First attribute of the given type (flag bits ignored).
    pub fn attr(&self, kind: u16) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.kind() == kind)
    }

    /// The total wire size of this message.
    pub fn wire_size(&self) -> usize {
        NLMSG_HDRLEN + GENL_HDRLEN + self.attrs.iter().map(Attribute::wire_size).sum::<usize>()
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self, max_frame: usize) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_message(self, &mut buf, max_frame)?;
        Ok(buf.freeze())
    }
}

/// One decoded netlink frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A generic netlink message.
    Genl(GenlMessage),
    /// `NLMSG_ERROR`: an acknowledgement (`error == 0`), a negative errno, or
    /// a non-negative operation result.
    Ack { seq: u32, port: u32, error: i32 },
    /// `NLMSG_NOOP`, `NLMSG_DONE`, `NLMSG_OVERRUN` and other reserved types.
    Control { kind: u16, seq: u32 },
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Ceiling for encoded frames. Default: 16 KiB.
    pub max_frame_size: usize,
    /// Size of the buffer datagrams are received into. Default: 32 KiB.
    pub recv_buffer_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            recv_buffer_size: DEFAULT_RECV_BUFFER,
        }
    }
}

/// Encode a generic netlink message into the wire format.
///
/// Wire format (native byte order):
/// ```text
/// ┌────────────┬──────────┬──────────┬──────────┬──────────┬─────┬─────┬──────┬────────────┐
/// │ Length(4B) │ Type(2B) │ Flags(2B)│ Seq(4B)  │ Port(4B) │ Cmd │ Ver │ Rsvd │ Attributes │
/// └────────────┴──────────┴──────────┴──────────┴──────────┴─────┴─────┴──────┴────────────┘
/// ```
///
/// Returns the number of bytes written.
pub fn encode_message(msg: &GenlMessage, dst: &mut BytesMut, max_frame: usize) -> Result<usize> {
    check_attributes(&msg.attrs)?;
    let size = msg.wire_size();
    if size > max_frame || size > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size,
            max: max_frame,
        });
    }

    dst.reserve(size);
    dst.put_u32_ne(size as u32);
    dst.put_u16_ne(msg.family);
    dst.put_u16_ne(msg.flags);
    dst.put_u32_ne(msg.seq);
    dst.put_u32_ne(msg.port);
    dst.put_u8(msg.cmd);
    dst.put_u8(msg.version);
    dst.put_u16_ne(0);
    encode_attributes(&msg.attrs, dst)?;
    Ok(size)
}

/// Encode a list of attributes, each padded to 4 bytes.
pub fn encode_attributes(attrs: &[Attribute], dst: &mut BytesMut) -> Result<()> {
    check_attributes(attrs)?;
    for attr in attrs {
        let len = NLA_HDRLEN + attr.payload.len();
        dst.put_u16_ne(len as u16);
        dst.put_u16_ne(attr.kind);
        dst.put_slice(&attr.payload);
        dst.put_bytes(0, align(len) - len);
    }
    Ok(())
}

fn check_attributes(attrs: &[Attribute]) -> Result<()> {
    match attrs.iter().find(|a| a.payload.len() > MAX_ATTR_PAYLOAD) {
        Some(attr) => Err(FrameError::AttributeTooLarge {
            kind: attr.kind(),
            size: attr.payload.len(),
            max: MAX_ATTR_PAYLOAD,
        }),
        None => Ok(()),
    }
}

/// Encode an `NLMSG_ERROR` frame as the kernel sends it in reply to a request.
pub fn encode_ack(seq: u32, port: u32, error: i32, dst: &mut BytesMut) {
    let size = NLMSG_HDRLEN + 4 + NLMSG_HDRLEN;
    dst.reserve(size);
    dst.put_u32_ne(size as u32);
    dst.put_u16_ne(NLMSG_ERROR);
    dst.put_u16_ne(0);
    dst.put_u32_ne(seq);
    dst.put_u32_ne(port);
    dst.put_i32_ne(error);
    // Header of the request being acknowledged.
    dst.put_u32_ne(NLMSG_HDRLEN as u32);
    dst.put_u16_ne(0);
    dst.put_u16_ne(NLM_F_REQUEST | NLM_F_ACK);
    dst.put_u32_ne(seq);
    dst.put_u32_ne(port);
}

/// Decode the netlink message at the start of `src`.
///
/// Trailing bytes past the message's own length are ignored; use
/// [`split_datagram`] to walk every message of a datagram.
pub fn decode_message(src: &Bytes) -> Result<Frame> {
    if src.len() < NLMSG_HDRLEN {
        return Err(FrameError::Malformed("truncated netlink header"));
    }

    let len = read_u32(src, 0) as usize;
    let kind = read_u16(src, 4);
    let flags = read_u16(src, 6);
    let seq = read_u32(src, 8);
    let port = read_u32(src, 12);

    if len < NLMSG_HDRLEN {
        return Err(FrameError::Malformed("netlink length shorter than header"));
    }
    if len > src.len() {
        return Err(FrameError::Malformed("netlink length exceeds buffer"));
    }

    let body = src.slice(NLMSG_HDRLEN..len);
    match kind {
        NLMSG_ERROR => {
            if body.len() < 4 {
                return Err(FrameError::Malformed("truncated netlink error code"));
            }
            let error = i32::from_ne_bytes([body[0], body[1], body[2], body[3]]);
            Ok(Frame::Ack { seq, port, error })
        }
        kind if kind < NLMSG_MIN_TYPE => Ok(Frame::Control { kind, seq }),
        family => {
            if body.len() < GENL_HDRLEN {
                return Err(FrameError::Malformed("truncated generic netlink header"));
            }
            let attrs = decode_attributes(&body.slice(GENL_HDRLEN..))?;
            Ok(Frame::Genl(GenlMessage {
                family,
                flags,
                seq,
                port,
                cmd: body[0],
                version: body[1],
                attrs,
            }))
        }
    }
}

/// Decode a packed attribute list.
///
/// Unknown types are returned as-is; interpretation is left to the caller.
pub fn decode_attributes(src: &Bytes) -> Result<Vec<Attribute>> {
    let mut attrs = Vec::new();
    let mut offset = 0usize;

    while offset < src.len() {
        let rest = src.len() - offset;
        if rest < NLA_HDRLEN {
            return Err(FrameError::Malformed("truncated attribute header"));
        }
        let len = read_u16(src, offset) as usize;
        let kind = read_u16(src, offset + 2);
        if len < NLA_HDRLEN {
            return Err(FrameError::Malformed("attribute length shorter than header"));
        }
        if len > rest {
            return Err(FrameError::Malformed("attribute length exceeds frame"));
        }

        attrs.push(Attribute {
            kind,
            payload: src.slice(offset + NLA_HDRLEN..offset + len),
        });
        offset += align(len);
    }

    Ok(attrs)
}

/// Split one received datagram into the netlink messages it carries.
pub fn split_datagram(datagram: Bytes) -> Frames {
    Frames {
        buf: datagram,
        offset: 0,
        failed: false,
    }
}

/// Iterator over the messages of a datagram, see [`split_datagram`].
///
/// Yields one error and stops at the first inconsistent length field.
#[derive(Debug)]
pub struct Frames {
    buf: Bytes,
    offset: usize,
    failed: bool,
}

impl Iterator for Frames {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }

        let rest = self.buf.len() - self.offset;
        if rest < NLMSG_HDRLEN {
            self.failed = true;
            return Some(Err(FrameError::Malformed(
                "datagram tail shorter than a netlink header",
            )));
        }

        let len = read_u32(&self.buf, self.offset) as usize;
        if len < NLMSG_HDRLEN || len > rest {
            self.failed = true;
            return Some(Err(FrameError::Malformed(
                "netlink length inconsistent with datagram",
            )));
        }

        let frame = self.buf.slice(self.offset..self.offset + len);
        self.offset += align(len);
        Some(Ok(frame))
    }
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GenlMessage {
        GenlMessage::request(0x1d, 2, 1)
            .with_seq(42)
            .with_attr(Attribute::u32(1, 7))
            .with_attr(Attribute::string(2, "diag"))
            .with_attr(Attribute::new(3, Bytes::from_static(b"\x01\x02\x03")))
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let msg = sample();
        let wire = msg.encode(DEFAULT_MAX_FRAME).unwrap();
        assert_eq!(wire.len(), msg.wire_size());
        assert_eq!(wire.len() % 4, 0);

        let frame = decode_message(&wire).unwrap();
        assert_eq!(frame, Frame::Genl(msg));
    }

    #[test]
    fn test_empty_attribute_list() {
        let msg = GenlMessage::new(0x20, 4, 1);
        let wire = msg.encode(DEFAULT_MAX_FRAME).unwrap();
        assert_eq!(wire.len(), NLMSG_HDRLEN + GENL_HDRLEN);
        assert_eq!(decode_message(&wire).unwrap(), Frame::Genl(msg));
    }

    #[test]
    fn test_every_truncated_prefix_is_malformed() {
        let wire = sample().encode(DEFAULT_MAX_FRAME).unwrap();
        for cut in 0..wire.len() {
            let prefix = wire.slice(..cut);
            let result = decode_message(&prefix);
            assert!(
                matches!(result, Err(FrameError::Malformed(_))),
                "prefix of {cut} bytes decoded as {result:?}"
            );
        }
    }

    #[test]
    fn test_attribute_length_past_frame() {
        let mut raw = BytesMut::new();
        encode_message(&GenlMessage::new(0x20, 1, 1), &mut raw, DEFAULT_MAX_FRAME).unwrap();
        // Attribute claims 64 bytes but only 4 follow.
        raw.put_u16_ne(64);
        raw.put_u16_ne(3);
        let total = raw.len() as u32;
        raw[0..4].copy_from_slice(&total.to_ne_bytes());

        let result = decode_message(&raw.freeze());
        assert_eq!(
            result,
            Err(FrameError::Malformed("attribute length exceeds frame"))
        );
    }

    #[test]
    fn test_attribute_length_shorter_than_header() {
        let mut raw = BytesMut::new();
        raw.put_u16_ne(2);
        raw.put_u16_ne(1);
        let result = decode_attributes(&raw.freeze());
        assert_eq!(
            result,
            Err(FrameError::Malformed("attribute length shorter than header"))
        );
    }

    #[test]
    fn test_netlink_length_shorter_than_header() {
        let mut raw = BytesMut::new();
        raw.put_u32_ne(8);
        raw.put_bytes(0, 12);
        assert_eq!(
            decode_message(&raw.freeze()),
            Err(FrameError::Malformed("netlink length shorter than header"))
        );
    }

    #[test]
    fn test_unknown_attributes_are_kept() {
        let msg = GenlMessage::new(0x20, 1, 1)
            .with_attr(Attribute::u8(99, 5))
            .with_attr(Attribute::u32(1, 3));
        let wire = msg.encode(DEFAULT_MAX_FRAME).unwrap();
        let Frame::Genl(decoded) = decode_message(&wire).unwrap() else {
            panic!("expected genl frame");
        };
        assert_eq!(decoded.attr(99).unwrap().as_u8().unwrap(), 5);
        assert_eq!(decoded.attr(1).unwrap().as_u32().unwrap(), 3);
    }

    #[test]
    fn test_nested_attributes() {
        let nested = Attribute::nested(
            7,
            &[Attribute::string(1, "msg"), Attribute::u32(2, 4)],
        )
        .unwrap();
        assert!(nested.is_nested());
        assert_eq!(nested.kind(), 7);

        let children = nested.children().unwrap();
        assert_eq!(children[0].as_str().unwrap(), "msg");
        assert_eq!(children[1].as_u32().unwrap(), 4);
    }

    #[test]
    fn test_attribute_too_large() {
        let msg = GenlMessage::new(0x20, 0, 1)
            .with_attr(Attribute::new(3, vec![0u8; MAX_ATTR_PAYLOAD + 1]));
        let err = msg.encode(usize::MAX).unwrap_err();
        assert!(matches!(err, FrameError::AttributeTooLarge { kind: 3, .. }));
    }

    #[test]
    fn test_frame_too_large() {
        let msg = GenlMessage::new(0x20, 0, 1).with_attr(Attribute::new(3, vec![0u8; 512]));
        let mut buf = BytesMut::new();
        let err = encode_message(&msg, &mut buf, 256).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { max: 256, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_ack_roundtrip() {
        let mut buf = BytesMut::new();
        encode_ack(9, 1234, -19, &mut buf);
        let frame = decode_message(&buf.freeze()).unwrap();
        assert_eq!(
            frame,
            Frame::Ack {
                seq: 9,
                port: 1234,
                error: -19
            }
        );
    }

    #[test]
    fn test_control_frames() {
        let mut buf = BytesMut::new();
        buf.put_u32_ne(NLMSG_HDRLEN as u32);
        buf.put_u16_ne(NLMSG_DONE);
        buf.put_u16_ne(NLM_F_MULTI);
        buf.put_u32_ne(5);
        buf.put_u32_ne(0);
        assert_eq!(
            decode_message(&buf.freeze()).unwrap(),
            Frame::Control {
                kind: NLMSG_DONE,
                seq: 5
            }
        );
    }

    #[test]
    fn test_split_datagram_with_several_frames() {
        let mut buf = BytesMut::new();
        let first = GenlMessage::new(0x20, 1, 1).with_attr(Attribute::u8(1, 1));
        let second = GenlMessage::new(0x20, 4, 1).with_seq(2);
        encode_message(&first, &mut buf, DEFAULT_MAX_FRAME).unwrap();
        encode_ack(3, 0, 0, &mut buf);
        encode_message(&second, &mut buf, DEFAULT_MAX_FRAME).unwrap();

        let frames: Vec<_> = split_datagram(buf.freeze())
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(decode_message(&frames[0]).unwrap(), Frame::Genl(first));
        assert!(matches!(
            decode_message(&frames[1]).unwrap(),
            Frame::Ack { seq: 3, .. }
        ));
        assert_eq!(decode_message(&frames[2]).unwrap(), Frame::Genl(second));
    }

    #[test]
    fn test_split_datagram_stops_at_garbage() {
        let mut buf = BytesMut::new();
        encode_message(&GenlMessage::new(0x20, 1, 1), &mut buf, DEFAULT_MAX_FRAME).unwrap();
        buf.put_slice(&[0xff; 6]);

        let mut frames = split_datagram(buf.freeze());
        assert!(frames.next().unwrap().is_ok());
        assert!(matches!(frames.next(), Some(Err(FrameError::Malformed(_)))));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_string_attribute_accessors() {
        let attr = Attribute::string(2, "wmx0");
        assert_eq!(attr.payload.len(), 5);
        assert_eq!(attr.as_str().unwrap(), "wmx0");

        let bad = Attribute::new(2, vec![0xff, 0xfe]);
        assert!(bad.as_str().is_err());
        assert!(Attribute::new(1, Vec::new()).as_u8().is_err());
        assert!(Attribute::new(1, vec![1, 2]).as_u32().is_err());
    }
}
