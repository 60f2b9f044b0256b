//! Bounded sequential writer for device messages.

use bytes::Bytes;

use super::encode_err;
use crate::error::{Result, ServiceInfoError};

/// Field-by-field encoder for one outgoing device value.
///
/// The buffer is capped at a fixed capacity; a write that would push the
/// encoded value past the cap fails with a typed error instead of
/// truncating. MessagePack arrays are length-prefixed, so there is no
/// explicit end-array step.
pub struct Writer {
    /// Encoded value for the current round.
    buf: Vec<u8>,
    /// Maximum encoded value size.
    capacity: usize,
}

impl Writer {
    /// Create a writer producing values up to `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Discard the current value and start a new round.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Begin an array of `len` elements.
    pub fn start_array(&mut self, len: u32) -> Result<()> {
        rmp::encode::write_array_len(&mut self.buf, len).map_err(encode_err)?;
        self.check_capacity()
    }

    /// Append a boolean field.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        rmp::encode::write_bool(&mut self.buf, value).map_err(encode_err)?;
        self.check_capacity()
    }

    /// Append a signed integer field.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        rmp::encode::write_sint(&mut self.buf, value).map_err(encode_err)?;
        self.check_capacity()
    }

    /// Append an unsigned integer field.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        rmp::encode::write_uint(&mut self.buf, value).map_err(encode_err)?;
        self.check_capacity()
    }

    /// Append a UTF-8 text field.
    pub fn write_text(&mut self, value: &str) -> Result<()> {
        rmp::encode::write_str(&mut self.buf, value).map_err(encode_err)?;
        self.check_capacity()
    }

    /// Append a binary field.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        rmp::encode::write_bin(&mut self.buf, value).map_err(encode_err)?;
        self.check_capacity()
    }

    /// Size of the value encoded so far.
    pub fn encoded_len(&self) -> usize {
        self.buf.len()
    }

    /// The encoded value.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Copy the encoded value out; the internal buffer stays allocated for
    /// the next round.
    pub fn take(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    fn check_capacity(&mut self) -> Result<()> {
        if self.buf.len() > self.capacity {
            let len = self.buf.len();
            self.buf.clear();
            return Err(ServiceInfoError::Encode(format!(
                "encoded value size {len} exceeds buffer capacity {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_status_fields() {
        let mut writer = Writer::new(128);
        writer.start_array(5).unwrap();
        writer.write_bool(false).unwrap();
        writer.write_i64(-1).unwrap();
        writer.write_u64(5).unwrap();
        writer.write_text("ok").unwrap();
        writer.write_text("key").unwrap();

        assert_eq!(writer.encoded_len(), writer.as_slice().len());

        // Decode back with the reader to confirm the grammar.
        let mut reader = crate::codec::Reader::new(128);
        reader.reset(&writer.take()).unwrap();
        assert_eq!(reader.array_len().unwrap(), 5);
        assert!(!reader.read_bool().unwrap());
        assert_eq!(reader.read_i64().unwrap(), -1);
        assert_eq!(reader.read_u64().unwrap(), 5);
        assert_eq!(reader.read_text(16).unwrap(), "ok");
        assert_eq!(reader.read_text(16).unwrap(), "key");
    }

    #[test]
    fn test_reset_clears_value() {
        let mut writer = Writer::new(64);
        writer.write_text("stale").unwrap();
        writer.reset();
        assert_eq!(writer.encoded_len(), 0);
        writer.write_bool(true).unwrap();
        assert_eq!(writer.as_slice(), &[0xc3]);
    }

    #[test]
    fn test_capacity_overflow_is_typed_error() {
        let mut writer = Writer::new(8);
        let err = writer.write_bytes(&[0u8; 32]).unwrap_err();
        assert!(err.to_string().contains("exceeds buffer capacity"));
        // Nothing partial is left behind.
        assert_eq!(writer.encoded_len(), 0);
    }

    #[test]
    fn test_take_preserves_buffer_for_reuse() {
        let mut writer = Writer::new(64);
        writer.write_u64(7).unwrap();
        let first = writer.take();
        assert_eq!(writer.encoded_len(), first.len());
        writer.reset();
        writer.write_u64(9).unwrap();
        assert_ne!(writer.take(), first);
    }
}
