//! Buffered lookahead over a byte source
//!
//! The cursor lets frame extractors peek arbitrarily far into the stream
//! and only consume bytes once a frame has fully validated. Committed
//! bytes are gone for good; a failed extraction attempt commits nothing.

use bytes::{Buf, BytesMut};
use std::io::{ErrorKind, Read};

/// Refill granularity when the lookahead buffer runs dry
const REFILL_CHUNK: usize = 4096;

/// Lookahead/commit cursor over any synchronous byte source.
///
/// Single owner, no locking. A read error from the underlying source is
/// treated the same as end of input; retry/reconnect is the capture
/// layer's job, not the parser's.
pub struct ByteCursor<R: Read> {
    source: R,
    buffer: BytesMut,
    offset: u64,
}

impl<R: Read> ByteCursor<R> {
    /// Create a cursor over a fresh byte source
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: BytesMut::with_capacity(REFILL_CHUNK),
            offset: 0,
        }
    }

    /// Number of bytes committed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Peek at up to `len` bytes without consuming them.
    ///
    /// Refills from the source in fixed chunks until `len` bytes are
    /// buffered or the source is exhausted. Returns fewer than `len`
    /// bytes only at end of source. Repeated calls without an
    /// intervening `commit` return the same bytes.
    pub fn lookup(&mut self, len: usize) -> &[u8] {
        while self.buffer.len() < len {
            let mut chunk = [0u8; REFILL_CHUNK];
            match self.source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "source read failed, treating as end of input");
                    break;
                }
            }
        }

        &self.buffer[..len.min(self.buffer.len())]
    }

    /// Consume up to `len` bytes, advancing the stream offset.
    ///
    /// Consumes `min(len, available)` bytes; committed bytes can never
    /// be looked up again.
    pub fn commit(&mut self, len: usize) {
        let have = self.lookup(len).len();
        self.offset += have as u64;
        self.buffer.advance(have);
    }

    /// True iff the buffer is empty and the source yields nothing more
    pub fn eof(&mut self) -> bool {
        if !self.buffer.is_empty() {
            return false;
        }
        self.lookup(1).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor_over(data: &[u8]) -> ByteCursor<Cursor<Vec<u8>>> {
        ByteCursor::new(Cursor::new(data.to_vec()))
    }

    #[test]
    fn test_lookup_is_idempotent() {
        let mut cur = cursor_over(b"abcdef");
        assert_eq!(cur.lookup(4), b"abcd");
        assert_eq!(cur.lookup(4), b"abcd");
        assert_eq!(cur.lookup(2), b"ab");
        assert_eq!(cur.offset(), 0);
    }

    #[test]
    fn test_commit_never_reexposes_bytes() {
        let mut cur = cursor_over(b"abcdef");
        cur.commit(3);
        assert_eq!(cur.offset(), 3);
        assert_eq!(cur.lookup(3), b"def");
        cur.commit(1);
        assert_eq!(cur.lookup(10), b"ef");
    }

    #[test]
    fn test_lookup_short_at_end_of_source() {
        let mut cur = cursor_over(b"xy");
        assert_eq!(cur.lookup(8), b"xy");
        cur.commit(8);
        assert_eq!(cur.offset(), 2);
        assert!(cur.eof());
    }

    #[test]
    fn test_eof_transitions() {
        let mut cur = cursor_over(b"z");
        assert!(!cur.eof());
        cur.commit(1);
        assert!(cur.eof());
    }

    #[test]
    fn test_refill_across_chunks() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut cur = ByteCursor::new(Cursor::new(data.clone()));
        assert_eq!(cur.lookup(9_000), &data[..9_000]);
        cur.commit(9_000);
        assert_eq!(cur.lookup(2_000), &data[9_000..]);
    }
}
