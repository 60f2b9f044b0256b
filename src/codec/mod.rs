//! Codec adapter - lazy sequential MessagePack reader/writer.
//!
//! The module never deserializes whole owner values at once: it walks the
//! encoded buffer field by field ([`Reader`]) and builds device values field
//! by field ([`Writer`]), mirroring the per-field contract of the protocol.
//! Both sides are bounded by a fixed capacity fixed at Start and are reset,
//! not reallocated, at the beginning of each round.
//!
//! # Example
//!
//! ```
//! use serviceinfo_device::codec::{Reader, Writer};
//!
//! let mut writer = Writer::new(64);
//! writer.start_array(2).unwrap();
//! writer.write_bytes(b"chunk").unwrap();
//! writer.write_text("key-1").unwrap();
//!
//! let mut reader = Reader::new(64);
//! reader.reset(&writer.take()).unwrap();
//! assert_eq!(reader.array_len().unwrap(), 2);
//! assert_eq!(&reader.read_bytes(16).unwrap()[..], b"chunk");
//! assert_eq!(reader.read_text(16).unwrap(), "key-1");
//! assert_eq!(reader.remaining(), 0);
//! ```

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use crate::error::ServiceInfoError;

/// Map a MessagePack decode failure onto the module error type.
pub(crate) fn decode_err(e: impl std::fmt::Display) -> ServiceInfoError {
    ServiceInfoError::Decode(e.to_string())
}

/// Map a MessagePack encode failure onto the module error type.
pub(crate) fn encode_err(e: impl std::fmt::Display) -> ServiceInfoError {
    ServiceInfoError::Encode(e.to_string())
}
