//! Buffer Storage
//!
//! The append-and-compact algorithm, generic over its [`Backing`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{Config, SyncStrategy};
use crate::encryption::{Encryption, NoEncryption};
use crate::error::{Result, StashError};
use crate::record::{Record, RecordHeader, HEADER_SIZE};

use super::{Backing, FileBacking, KeyIndex, MemoryBacking, Storage};

/// Volatile store
pub type MemoryStorage = BufferStorage<MemoryBacking>;

/// Durable store recovered from its file on open
pub type FileStorage = BufferStorage<FileBacking>;

/// Layout case handled by a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compaction {
    /// The only record went away; the used length resets to zero
    Emptied,
    /// Record at offset 0; everything after it moves left
    First,
    /// Record ending at the used length; nothing moves
    Last,
    /// Record in the middle; the tail moves left
    Interior,
}

/// Record store over a contiguous byte backing
///
/// ## Concurrency Model
///
/// The backing, the index and the used-length mark form one
/// state behind a single mutex. Every operation, reads
/// included, holds it: a compaction relocates the very bytes a read
/// may be about to access. Encryption runs outside the lock.
pub struct BufferStorage<B: Backing> {
    /// Backing + index + used length
    state: Mutex<StoreState<B>>,

    /// Payload cipher
    encryption: Arc<dyn Encryption>,

    /// When to fsync the backing
    sync_strategy: SyncStrategy,
}

impl<B: Backing> std::fmt::Debug for BufferStorage<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferStorage")
            .field("sync_strategy", &self.sync_strategy)
            .finish_non_exhaustive()
    }
}

/// Mutable state guarded by the storage lock
struct StoreState<B: Backing> {
    backing: B,
    index: KeyIndex,
    /// End of the last live record
    used: u64,
    /// Mutations since the last sync
    unsynced: usize,
}

// =============================================================================
// Constructors
// =============================================================================

impl MemoryStorage {
    /// Initial in-memory capacity in bytes
    pub const INITIAL_CAPACITY: usize = 128;

    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::with_encryption(Arc::new(NoEncryption))
    }

    /// Create an empty in-memory store with a payload cipher
    pub fn with_encryption(encryption: Arc<dyn Encryption>) -> Self {
        Self::from_parts(
            MemoryBacking::with_capacity(Self::INITIAL_CAPACITY),
            KeyIndex::new(),
            0,
            encryption,
            SyncStrategy::EveryWrite,
        )
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStorage {
    /// Open or create the store file at `config.path`
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_with_encryption(config, Arc::new(NoEncryption))
    }

    /// Open or create the store file with a payload cipher
    ///
    /// The cipher must be the one the file was written with; recovery
    /// itself never decrypts, so a mismatch surfaces on first read.
    pub fn open_with_encryption(config: &Config, encryption: Arc<dyn Encryption>) -> Result<Self> {
        let (backing, index, recovery) = FileBacking::open(config)?;
        Ok(Self::from_parts(
            backing,
            index,
            recovery.used_len,
            encryption,
            config.sync_strategy,
        ))
    }

    /// Path of the underlying file
    pub fn path(&self) -> std::path::PathBuf {
        self.state.lock().backing.path().to_path_buf()
    }
}

impl<B: Backing> BufferStorage<B> {
    fn from_parts(
        backing: B,
        index: KeyIndex,
        used: u64,
        encryption: Arc<dyn Encryption>,
        sync_strategy: SyncStrategy,
    ) -> Self {
        Self {
            state: Mutex::new(StoreState {
                backing,
                index,
                used,
                unsynced: 0,
            }),
            encryption,
            sync_strategy,
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Offset of the record stored under `key`
    pub fn offset_of(&self, key: &[u8]) -> Option<u64> {
        self.state.lock().index.get(key)
    }

    /// End of the last live record
    pub fn used_len(&self) -> u64 {
        self.state.lock().used
    }

    /// Physical size of the backing
    pub fn capacity(&self) -> u64 {
        self.state.lock().backing.capacity()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (key, offset) pair, in key order
    pub fn index_snapshot(&self) -> Vec<(Vec<u8>, u64)> {
        self.state.lock().index.snapshot()
    }

    fn decrypt(&self, stored: Record) -> Result<Record> {
        let (key, sealed) = stored.into_parts();
        let payload = self.encryption.decrypt(&key, &sealed)?;
        Ok(Record::new(key, payload))
    }
}

// =============================================================================
// Storage Implementation
// =============================================================================

impl<B: Backing> Storage for BufferStorage<B> {
    /// Put a record
    ///
    /// Steps:
    /// 1. Encrypt the payload
    /// 2. Same-size payload under an existing key: overwrite in place
    /// 3. Different size: remove the old record (compaction)
    /// 4. Append, growing the backing if needed
    fn put(&self, record: Record) -> Result<()> {
        if record.key().is_empty() {
            return Err(StashError::InvalidRecord("key must not be empty".to_string()));
        }

        let (key, payload) = record.into_parts();
        let sealed = self.encryption.encrypt(&key, &payload)?;
        let stored = Record::new(key, sealed);
        let encoded = stored.encode()?;

        let mut state = self.state.lock();
        state.write_record(stored.key(), stored.payload().len(), &encoded)?;
        state.after_write(self.sync_strategy);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Record>> {
        let stored = {
            let mut state = self.state.lock();
            match state.index.get(key) {
                Some(offset) => state.read_record(offset)?,
                None => return Ok(None),
            }
        };

        self.decrypt(stored).map(Some)
    }

    fn remove(&self, key: &[u8]) -> Result<Option<Record>> {
        let stored = {
            let mut state = self.state.lock();
            let offset = match state.index.get(key) {
                Some(offset) => offset,
                None => return Ok(None),
            };

            let stored = state.read_record(offset)?;
            state.remove_at(key, offset, stored.size() as u64)?;
            state.after_write(self.sync_strategy);
            stored
        };

        self.decrypt(stored).map(Some)
    }

    fn prefixed_with(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self.state.lock().index.prefixed(prefix))
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.backing.sync()?;
        state.unsynced = 0;
        Ok(())
    }
}

impl<B: Backing> Drop for BufferStorage<B> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.unsynced > 0 {
            if let Err(e) = state.backing.sync() {
                tracing::warn!("Failed to sync store on drop: {}", e);
            }
        }
    }
}

// =============================================================================
// Algorithm (called with the lock held)
// =============================================================================

impl<B: Backing> StoreState<B> {
    fn write_record(&mut self, key: &[u8], payload_len: usize, encoded: &[u8]) -> Result<()> {
        if let Some(offset) = self.index.get(key) {
            let header = self.read_header(offset)?;

            if header.payload_len as usize == payload_len {
                self.backing.write_at(offset, encoded)?;
                tracing::trace!(offset, size = encoded.len(), "overwrote record in place");
                return Ok(());
            }

            self.remove_at(key, offset, header.record_size())?;
        }

        self.append(key, encoded)
    }

    fn append(&mut self, key: &[u8], encoded: &[u8]) -> Result<()> {
        let size = encoded.len() as u64;
        let capacity = self.backing.capacity();

        if self.used + size > capacity {
            let grown = capacity.saturating_mul(2).max(self.used + 2 * size);
            tracing::debug!(from = capacity, to = grown, "growing backing");
            self.backing.resize(grown)?;
        }

        let offset = self.used;
        self.backing.write_at(offset, encoded)?;
        self.index.insert(key, offset);
        self.used += size;

        tracing::trace!(offset, size, "appended record");
        Ok(())
    }

    /// Remove the record at `offset` and close the gap it leaves
    fn remove_at(&mut self, key: &[u8], offset: u64, size: u64) -> Result<Compaction> {
        let case = if self.index.len() == 1 {
            Compaction::Emptied
        } else if offset == 0 {
            Compaction::First
        } else if offset + size == self.used {
            Compaction::Last
        } else {
            Compaction::Interior
        };

        match case {
            Compaction::Emptied => self.used = 0,
            Compaction::Last => self.used -= size,
            Compaction::First | Compaction::Interior => {
                let tail_start = offset + size;
                let tail_len = self.used - tail_start;
                self.backing.shift_left(tail_start, offset, tail_len)?;
                self.used -= size;
                self.index.shift_after(offset, size);
            }
        }

        self.index.remove(key);

        // Reclaim space; also keeps every byte past `used` zero
        let capacity = self.backing.capacity();
        if capacity > self.used {
            tracing::debug!(from = capacity, to = self.used, "shrinking backing");
            self.backing.resize(self.used)?;
        }

        tracing::trace!(?case, offset, size, used = self.used, "removed record");
        Ok(case)
    }

    fn read_header(&mut self, offset: u64) -> Result<RecordHeader> {
        let mut header = [0u8; HEADER_SIZE];
        self.backing.read_at(offset, &mut header)?;
        Ok(RecordHeader::decode(&header))
    }

    fn read_record(&mut self, offset: u64) -> Result<Record> {
        let header = self.read_header(offset)?;
        let key_len = header.key_len as usize;

        let mut body = vec![0u8; key_len + header.payload_len as usize];
        self.backing.read_at(offset + HEADER_SIZE as u64, &mut body)?;

        let payload = body.split_off(key_len);
        Ok(Record::new(body, payload))
    }

    /// Count a mutation and sync when the strategy says so
    ///
    /// A failed sync leaves `unsynced` raised, so the next write (or
    /// `flush`) tries again.
    fn after_write(&mut self, strategy: SyncStrategy) {
        self.unsynced += 1;

        let due = match strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNWrites { count } => self.unsynced >= count,
        };

        if due {
            match self.backing.sync() {
                Ok(()) => self.unsynced = 0,
                Err(e) => tracing::warn!(
                    unsynced = self.unsynced,
                    "Failed to sync store after write: {}",
                    e
                ),
            }
        }
    }
}
