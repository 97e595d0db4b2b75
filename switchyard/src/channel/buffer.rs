//! Per-read accumulation buffer.
//!
//! Every read operation on a [`Connection`](super::Connection) gets a fresh
//! `StreamBuffer`. Bytes are appended exactly as they arrived from the device;
//! escape sequences are left intact so prompt patterns can match on them.

use bytes::BytesMut;

/// Initial capacity; most command responses fit without reallocating.
const INITIAL_CAPACITY: usize = 4096;

/// Append-only buffer of bytes received since the start of one read.
#[derive(Debug)]
pub struct StreamBuffer {
    buffer: BytesMut,
}

impl StreamBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append a chunk.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the buffer, returning its contents.
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_keeps_escape_sequences() {
        let mut buffer = StreamBuffer::new();
        buffer.extend(b"switch# ");
        buffer.extend(b"\x1b[24;1H");
        assert_eq!(buffer.as_slice(), b"switch# \x1b[24;1H");
        assert_eq!(buffer.len(), 15);
    }

    #[test]
    fn test_into_vec() {
        let mut buffer = StreamBuffer::default();
        assert!(buffer.is_empty());
        buffer.extend(b"show ");
        buffer.extend(b"version");
        assert_eq!(buffer.into_vec(), b"show version".to_vec());
    }
}
