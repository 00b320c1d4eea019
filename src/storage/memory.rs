//! In-memory backing
//!
//! Volatile growable buffer. Contents vanish with the process.

use bytes::BytesMut;

use crate::error::{Result, StashError};

use super::Backing;

/// Zero-filled growable byte buffer
#[derive(Debug, Default)]
pub struct MemoryBacking {
    buf: BytesMut,
}

impl MemoryBacking {
    /// Create a buffer of `capacity` zero bytes
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = BytesMut::with_capacity(capacity);
        buf.resize(capacity, 0);
        Self { buf }
    }

    fn range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let start = offset as usize;
        let end = start.saturating_add(len);
        if end > self.buf.len() {
            return Err(StashError::corruption(
                offset,
                format!("access of {} bytes past buffer end ({})", len, self.buf.len()),
            ));
        }
        Ok(start..end)
    }
}

impl Backing for MemoryBacking {
    fn capacity(&self) -> u64 {
        self.buf.len() as u64
    }

    fn resize(&mut self, capacity: u64) -> Result<()> {
        self.buf.resize(capacity as usize, 0);
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.buf[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let range = self.range(offset, data.len())?;
        self.buf[range].copy_from_slice(data);
        Ok(())
    }

    fn shift_left(&mut self, src: u64, dst: u64, len: u64) -> Result<()> {
        let range = self.range(src, len as usize)?;
        self.buf.copy_within(range, dst as usize);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
