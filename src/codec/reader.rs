//! Bounded sequential reader over an encoded owner value.

use bytes::{Bytes, BytesMut};

use super::decode_err;
use crate::error::{Result, ServiceInfoError};

/// Lazy field-by-field decoder over one owner-supplied value.
///
/// The reader owns a buffer with a fixed capacity; `reset` copies the next
/// round's value into it and rejects anything larger. Every typed read
/// validates length caps before copying a single byte out, so a failed read
/// never leaves partially committed data behind.
pub struct Reader {
    /// Encoded value for the current round.
    buf: BytesMut,
    /// Decode position within `buf`.
    pos: usize,
    /// Maximum accepted value size.
    capacity: usize,
}

impl Reader {
    /// Create a reader that accepts values up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            pos: 0,
            capacity,
        }
    }

    /// Load the next round's encoded value.
    ///
    /// # Errors
    ///
    /// Returns a content error if `data` exceeds the reader capacity.
    pub fn reset(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.capacity {
            return Err(ServiceInfoError::content(format!(
                "value size {} exceeds buffer capacity {}",
                data.len(),
                self.capacity
            )));
        }
        self.buf.clear();
        self.buf.extend_from_slice(data);
        self.pos = 0;
        Ok(())
    }

    /// Bytes not yet decoded in the current value.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read an array header and return the element count.
    pub fn array_len(&mut self) -> Result<u32> {
        self.consume(|slice| rmp::decode::read_array_len(slice).map_err(decode_err))
    }

    /// Read a boolean field.
    pub fn read_bool(&mut self) -> Result<bool> {
        self.consume(|slice| rmp::decode::read_bool(slice).map_err(decode_err))
    }

    /// Read a signed integer field.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.consume(|slice| rmp::decode::read_int(slice).map_err(decode_err))
    }

    /// Read an unsigned integer field.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.consume(|slice| rmp::decode::read_int(slice).map_err(decode_err))
    }

    /// Read a UTF-8 text field of at most `max_len` bytes.
    ///
    /// The declared length is checked against `max_len` before any bytes are
    /// copied. An empty string is valid and consumes only its header.
    pub fn read_text(&mut self, max_len: usize) -> Result<String> {
        let raw = self.read_len_prefixed(max_len, |slice| {
            rmp::decode::read_str_len(slice).map_err(decode_err)
        })?;
        let text = std::str::from_utf8(&raw)
            .map_err(|e| ServiceInfoError::Decode(format!("invalid UTF-8 in text field: {e}")))?;
        Ok(text.to_owned())
    }

    /// Read a binary field of at most `max_len` bytes.
    ///
    /// An empty byte string is valid and consumes only its header.
    pub fn read_bytes(&mut self, max_len: usize) -> Result<Bytes> {
        self.read_len_prefixed(max_len, |slice| {
            rmp::decode::read_bin_len(slice).map_err(decode_err)
        })
    }

    /// Run a decode step over the remaining bytes and advance past whatever
    /// it consumed.
    fn consume<T>(&mut self, f: impl FnOnce(&mut &[u8]) -> Result<T>) -> Result<T> {
        let mut slice: &[u8] = &self.buf[self.pos..];
        let before = slice.len();
        let value = f(&mut slice)?;
        self.pos += before - slice.len();
        Ok(value)
    }

    /// Shared body of `read_text`/`read_bytes`: header via `read_len`, then
    /// exactly that many raw bytes.
    fn read_len_prefixed(
        &mut self,
        max_len: usize,
        read_len: impl FnOnce(&mut &[u8]) -> Result<u32>,
    ) -> Result<Bytes> {
        let mut slice: &[u8] = &self.buf[self.pos..];
        let before = slice.len();
        let len = read_len(&mut slice)? as usize;
        if len > max_len {
            return Err(ServiceInfoError::content(format!(
                "field length {len} exceeds limit {max_len}"
            )));
        }
        if len > slice.len() {
            return Err(ServiceInfoError::Decode(format!(
                "field declares {len} bytes but only {} remain",
                slice.len()
            )));
        }
        let raw = Bytes::copy_from_slice(&slice[..len]);
        self.pos += (before - slice.len()) + len;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(data: &[u8]) -> Reader {
        let mut reader = Reader::new(256);
        reader.reset(data).unwrap();
        reader
    }

    #[test]
    fn test_reset_rejects_oversized_value() {
        let mut reader = Reader::new(4);
        let err = reader.reset(&[0u8; 5]).unwrap_err();
        assert!(err.to_string().contains("exceeds buffer capacity"));
    }

    #[test]
    fn test_reset_reuses_buffer() {
        let mut reader = Reader::new(16);
        reader.reset(&[0xc3]).unwrap(); // true
        assert!(reader.read_bool().unwrap());
        reader.reset(&[0xc2]).unwrap(); // false
        assert!(!reader.read_bool().unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_scalars() {
        // [true, -7, 42]
        let mut buf = Vec::new();
        rmp::encode::write_array_len(&mut buf, 3).unwrap();
        rmp::encode::write_bool(&mut buf, true).unwrap();
        rmp::encode::write_sint(&mut buf, -7).unwrap();
        rmp::encode::write_uint(&mut buf, 42).unwrap();

        let mut reader = loaded(&buf);
        assert_eq!(reader.array_len().unwrap(), 3);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_i64().unwrap(), -7);
        assert_eq!(reader.read_u64().unwrap(), 42);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_text() {
        let mut buf = Vec::new();
        rmp::encode::write_str(&mut buf, "payload.bin").unwrap();
        let mut reader = loaded(&buf);
        assert_eq!(reader.read_text(32).unwrap(), "payload.bin");
    }

    #[test]
    fn test_read_empty_text_consumes_header_only() {
        let mut buf = Vec::new();
        rmp::encode::write_str(&mut buf, "").unwrap();
        let mut reader = loaded(&buf);
        assert_eq!(reader.read_text(32).unwrap(), "");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_text_over_limit_is_content_error() {
        let mut buf = Vec::new();
        rmp::encode::write_str(&mut buf, "much-too-long").unwrap();
        let mut reader = loaded(&buf);
        let err = reader.read_text(4).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[test]
    fn test_read_bytes() {
        let mut buf = Vec::new();
        rmp::encode::write_bin(&mut buf, &[1, 2, 3, 4]).unwrap();
        let mut reader = loaded(&buf);
        assert_eq!(&reader.read_bytes(16).unwrap()[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_field_is_decode_error() {
        let mut buf = Vec::new();
        rmp::encode::write_bin(&mut buf, &[9u8; 8]).unwrap();
        buf.truncate(buf.len() - 3);
        let mut reader = loaded(&buf);
        let err = reader.read_bytes(16).unwrap_err();
        assert!(err.to_string().contains("remain"));
    }

    #[test]
    fn test_type_mismatch_is_decode_error() {
        let mut buf = Vec::new();
        rmp::encode::write_str(&mut buf, "oops").unwrap();
        let mut reader = loaded(&buf);
        assert!(reader.read_bool().is_err());
    }

    #[test]
    fn test_failed_read_does_not_advance() {
        let mut buf = Vec::new();
        rmp::encode::write_str(&mut buf, "too-long-for-cap").unwrap();
        let mut reader = loaded(&buf);
        let before = reader.remaining();
        assert!(reader.read_text(4).is_err());
        assert_eq!(reader.remaining(), before);
    }
}
