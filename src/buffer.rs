//! Byte accumulator for resumable frame decoding

use crate::{
    constants::BUF_CHUNK,
    error::{EslError, EslResult},
};
use bytes::{Buf, Bytes, BytesMut};

/// Location of the blank line that closes a header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderEnd {
    /// Length of the header block, excluding the final line ending
    pub block_len: usize,
    /// Bytes to consume past the block (`\n\n`, `\n\r\n` or `\r\n\r\n` tail)
    pub terminator_len: usize,
}

/// Connection-local receive buffer.
///
/// Bytes are appended as they arrive from the socket and consumed from the
/// front by the codec; anything not yet consumed survives across decode calls.
pub struct EslBuffer {
    buffer: BytesMut,
}

impl EslBuffer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(BUF_CHUNK),
        }
    }

    /// Number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.buffer
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer
            .is_empty()
    }

    /// Append data received from the socket
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        if self.buffer.capacity() - self.buffer.len() < data.len() {
            let old_cap = self
                .buffer
                .capacity();
            self.buffer
                .reserve(data.len().max(BUF_CHUNK));
            tracing::trace!(
                "Buffer grew from {} to {} bytes",
                old_cap,
                self.buffer
                    .capacity()
            );
        }
        self.buffer
            .extend_from_slice(data);
    }

    /// Unconsumed data
    pub fn data(&self) -> &[u8] {
        &self.buffer[..]
    }

    /// Discard `count` bytes from the front.
    ///
    /// Returns `Err` if `count` exceeds the available data.
    pub fn advance(&mut self, count: usize) -> EslResult<()> {
        let available = self.len();
        if count > available {
            return Err(EslError::malformed(format!(
                "cannot advance {} bytes, only {} available",
                count, available
            )));
        }
        self.buffer
            .advance(count);
        Ok(())
    }

    /// Find the blank line ending a header block, accepting LF or CRLF endings.
    pub fn find_header_end(&self) -> Option<HeaderEnd> {
        let data = self.data();
        let mut i = 0;
        while let Some(offset) = data[i..]
            .iter()
            .position(|&b| b == b'\n')
        {
            let nl = i + offset;
            let rest = &data[nl + 1..];
            let blank = if rest.starts_with(b"\n") {
                Some(1)
            } else if rest.starts_with(b"\r\n") {
                Some(2)
            } else {
                None
            };
            if let Some(blank_len) = blank {
                // Strip the CR of a CRLF-terminated last header line
                let block_len = if nl > 0 && data[nl - 1] == b'\r' {
                    nl - 1
                } else {
                    nl
                };
                return Some(HeaderEnd {
                    block_len,
                    terminator_len: (nl - block_len) + 1 + blank_len,
                });
            }
            i = nl + 1;
        }
        None
    }

    /// Take exactly `count` bytes from the front, if that many are buffered
    pub fn extract_bytes(&mut self, count: usize) -> Option<Bytes> {
        if self.len() >= count {
            Some(
                self.buffer
                    .split_to(count)
                    .freeze(),
            )
        } else {
            None
        }
    }

    /// Fail once more than `limit` bytes are waiting to be decoded
    pub fn check_size_limits(&self, limit: usize) -> EslResult<()> {
        if self.len() > limit {
            tracing::error!(
                "Receive buffer holds {} bytes without a complete frame (limit {})",
                self.len(),
                limit
            );
            return Err(EslError::malformed(format!(
                "frame exceeds maximum size of {} bytes",
                limit
            )));
        }
        Ok(())
    }
}

impl Default for EslBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut buffer = EslBuffer::new();
        assert!(buffer.is_empty());

        buffer.extend_from_slice(b"Hello World");
        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.data(), b"Hello World");
    }

    #[test]
    fn test_advance_overflow() {
        let mut buffer = EslBuffer::new();
        buffer.extend_from_slice(b"Hello");
        assert!(buffer
            .advance(10)
            .is_err());
        buffer
            .advance(2)
            .unwrap();
        assert_eq!(buffer.data(), b"llo");
    }

    #[test]
    fn test_find_header_end_lf() {
        let mut buffer = EslBuffer::new();
        buffer.extend_from_slice(b"A: 1\nB: 2\n\nBody");
        let end = buffer
            .find_header_end()
            .unwrap();
        assert_eq!(end.block_len, 9);
        assert_eq!(end.terminator_len, 2);
        assert_eq!(&buffer.data()[end.block_len + end.terminator_len..], b"Body");
    }

    #[test]
    fn test_find_header_end_crlf() {
        let mut buffer = EslBuffer::new();
        buffer.extend_from_slice(b"Header1: Value1\r\nHeader2: Value2\r\n\r\nBody");
        let end = buffer
            .find_header_end()
            .unwrap();
        assert_eq!(&buffer.data()[..end.block_len], b"Header1: Value1\r\nHeader2: Value2");
        assert_eq!(&buffer.data()[end.block_len + end.terminator_len..], b"Body");
    }

    #[test]
    fn test_find_header_end_incomplete() {
        let mut buffer = EslBuffer::new();
        buffer.extend_from_slice(b"Content-Type: auth/request\r\n");
        assert!(buffer
            .find_header_end()
            .is_none());
    }

    #[test]
    fn test_extract_bytes() {
        let mut buffer = EslBuffer::new();
        buffer.extend_from_slice(b"Hello World");

        assert!(buffer
            .extract_bytes(20)
            .is_none());
        let data = buffer
            .extract_bytes(5)
            .unwrap();
        assert_eq!(&data[..], b"Hello");
        assert_eq!(buffer.data(), b" World");
    }

    #[test]
    fn test_size_limit() {
        let mut buffer = EslBuffer::new();
        buffer.extend_from_slice(&[b'x'; 32]);
        assert!(buffer
            .check_size_limits(64)
            .is_ok());
        assert!(matches!(
            buffer.check_size_limits(16),
            Err(EslError::MalformedFrame { .. })
        ));
    }
}
