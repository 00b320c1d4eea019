//! Record Module
//!
//! The unit of persistence: an immutable key + payload pair.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────┬──────────────────┬───────────┬───────────────┐
//! │ KeyLen (4)   │ PayloadLen (4)   │ Key       │ Payload       │
//! └──────────────┴──────────────────┴───────────┴───────────────┘
//! ```
//! Both lengths are big-endian `u32`. No padding, no checksum.

mod key;

use bytes::BufMut;

use crate::error::{Result, StashError};

pub use key::OrderedKey;

/// Header size: KeyLen (4) + PayloadLen (4)
pub const HEADER_SIZE: usize = 8;

/// A key and its payload as stored by [`crate::storage::Storage`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Record {
    key: Vec<u8>,
    payload: Vec<u8>,
}

impl Record {
    /// Create a new record
    pub fn new(key: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.payload)
    }

    /// Number of bytes this record occupies on the wire
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.payload.len()
    }

    /// Serialize header + key + payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let key_len = wire_len(self.key.len(), "key")?;
        let payload_len = wire_len(self.payload.len(), "payload")?;

        let mut buf = Vec::with_capacity(self.size());
        buf.put_u32(key_len);
        buf.put_u32(payload_len);
        buf.put_slice(&self.key);
        buf.put_slice(&self.payload);
        Ok(buf)
    }
}

/// Parsed fixed-size record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub key_len: u32,
    pub payload_len: u32,
}

impl RecordHeader {
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        let [k0, k1, k2, k3, p0, p1, p2, p3] = *bytes;
        Self {
            key_len: u32::from_be_bytes([k0, k1, k2, k3]),
            payload_len: u32::from_be_bytes([p0, p1, p2, p3]),
        }
    }

    /// Size of the whole record this header describes
    pub fn record_size(&self) -> u64 {
        HEADER_SIZE as u64 + self.key_len as u64 + self.payload_len as u64
    }
}

fn wire_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        StashError::InvalidRecord(format!("{} of {} bytes exceeds u32 length prefix", what, len))
    })
}
