use std::ops::Deref;

use bytes::Bytes;

/// A driver message handed to the caller by a raw read.
///
/// Holds only the payload; the netlink envelope is already stripped. The
/// handle keeps no reference to it once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgBuffer {
    data: Bytes,
    pipe_name: Option<String>,
}

impl MsgBuffer {
    /// Copies `data` out of the received datagram so the buffer owns only
    /// its payload.
    pub(crate) fn new(data: &[u8], pipe_name: Option<String>) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            pipe_name,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pipe name the driver tagged the message with, if any.
    pub fn pipe_name(&self) -> Option<&str> {
        self.pipe_name.as_deref()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Release the buffer. Equivalent to dropping it.
    pub fn free(self) {}
}

impl Deref for MsgBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for MsgBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_owns_only_its_payload() {
        let datagram = Bytes::from(vec![7u8; 4096]);
        let payload = datagram.slice(100..104);
        let buf = MsgBuffer::new(&payload, Some("msg".into()));

        assert_eq!(buf.as_bytes(), &[7, 7, 7, 7]);
        assert_ne!(buf.as_bytes().as_ptr(), payload.as_ptr());
        let owned = buf.into_bytes();
        assert_eq!(owned.len(), 4);
    }
}
