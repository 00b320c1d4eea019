//! Storage Module
//!
//! Append-and-compact persistence of [`Record`]s.
//!
//! ## Responsibilities
//! - Append new records at the used-length mark
//! - Overwrite same-size payloads in place
//! - Compact the backing on removal so live records stay contiguous
//! - Rebuild the key index from an existing file on startup
//!
//! ## File Format
//! ```text
//! offset 0                                              used_len   capacity
//! ├───────────────┬───────────────┬─────┬───────────────┼──────────┤
//! │ Record 1      │ Record 2      │ ... │ Record N      │ 0x00 ... │
//! └───────────────┴───────────────┴─────┴───────────────┴──────────┘
//!   each record: [KeyLen u32][PayloadLen u32][Key][Payload]
//! ```
//! No file header and no checksum. A zero key length (or the physical end
//! of the file) marks the end of data.
//!
//! ## Backends
//! One algorithm ([`BufferStorage`]) runs over two [`Backing`]s:
//! - [`MemoryBacking`]: growable in-memory buffer ([`MemoryStorage`])
//! - [`FileBacking`]: seekable file, durable across restarts ([`FileStorage`])

mod file;
mod index;
mod memory;
mod recovery;
mod store;

use crate::error::Result;
use crate::record::Record;

pub use file::FileBacking;
pub use index::KeyIndex;
pub use memory::MemoryBacking;
pub use recovery::{IndexRecovery, RecoveryResult};
pub use store::{BufferStorage, Compaction, FileStorage, MemoryStorage};

/// Key/record store consumed by collections
///
/// `put` replaces any previous payload under the same key. `get` and
/// `remove` of an absent key return `Ok(None)`.
///
/// A `put` or `remove` that returns `Ok` has been applied. Syncing it
/// to durable storage may still be pending; `flush` reports any sync
/// error.
pub trait Storage: Send + Sync {
    /// Insert or replace a record
    fn put(&self, record: Record) -> Result<()>;

    /// Look up the record stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Record>>;

    /// Remove and return the record stored under `key`
    fn remove(&self, key: &[u8]) -> Result<Option<Record>>;

    /// All stored keys starting with `prefix`, in key order
    fn prefixed_with(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Force buffered writes to durable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Raw byte container underneath [`BufferStorage`]
///
/// Offsets are absolute. Bytes added by `resize` read as zero.
pub trait Backing: Send {
    /// Physical size in bytes
    fn capacity(&self) -> u64;

    /// Grow or shrink to exactly `capacity` bytes
    fn resize(&mut self, capacity: u64) -> Result<()>;

    /// Fill `buf` with the bytes at `offset`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `data` at `offset`; the range must lie within capacity
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Move `len` bytes from `src` down to `dst` (`dst < src`)
    fn shift_left(&mut self, src: u64, dst: u64, len: u64) -> Result<()>;

    /// Make written bytes durable
    fn sync(&mut self) -> Result<()>;
}
