//! The byte queue a [`Parser`](crate::parser::Parser) pulls exact counts
//! from (spec §3 `ParserBuffer`, §4.1 Stream+ParserContext).

use bytes::{Bytes, BytesMut};

/// Holds unconsumed input for a connection. Bytes are appended at the back
/// by `feed_bytes` and consumed from the front only when a full requested
/// count is available -- a partial pull never removes anything, so a
/// parser that can't yet make progress leaves the buffer untouched.
#[derive(Default)]
pub struct ParserBuffer {
    buf: BytesMut,
}

impl ParserBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Removes and returns exactly `n` bytes from the front, or `None` if
    /// fewer than `n` are currently buffered -- the pull-model contract
    /// from spec §4.1: `read(n)` only ever yields exact counts.
    pub fn try_take(&mut self, n: usize) -> Option<Bytes> {
        if self.buf.len() < n {
            return None;
        }
        Some(self.buf.split_to(n).freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_take_waits_for_enough_bytes() {
        let mut buf = ParserBuffer::new();
        buf.extend(&[1, 2, 3]);
        assert!(buf.try_take(4).is_none());
        assert_eq!(buf.len(), 3, "a failed pull must not consume bytes");

        buf.extend(&[4]);
        let taken = buf.try_take(4).unwrap();
        assert_eq!(&taken[..], &[1, 2, 3, 4]);
        assert!(buf.is_empty());
    }

    #[test]
    fn try_take_across_many_small_feeds() {
        let mut buf = ParserBuffer::new();
        for byte in [0xAAu8, 0xBB, 0xCC, 0xDD] {
            assert!(buf.try_take(4).is_none());
            buf.extend(&[byte]);
        }
        assert_eq!(&buf.try_take(4).unwrap()[..], &[0xAA, 0xBB, 0xCC, 0xDD]);
    }
}
