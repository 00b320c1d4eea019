//! File backing
//!
//! Seekable file holding the store image. Every byte written to the
//! backing lands in the file, so reopening reproduces the index.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::{CompactionBuffer, Config};
use crate::error::{Result, StashError};

use super::{Backing, IndexRecovery, KeyIndex, RecoveryResult};

/// File-backed byte container
#[derive(Debug)]
pub struct FileBacking {
    /// Path of the store file
    path: PathBuf,

    /// Open read/write handle
    file: File,

    /// Current file length
    capacity: u64,

    /// Scratch bounds for moving tails during compaction
    compaction: CompactionBuffer,
}

impl FileBacking {
    /// Open or create the store file named by `config.path`
    ///
    /// On startup:
    /// 1. Create parent directories and the file if missing
    /// 2. Rebuild the index from existing records
    /// 3. Drop any bytes past the last record
    /// 4. Extend to the initial capacity with zeros
    pub fn open(config: &Config) -> Result<(Self, KeyIndex, RecoveryResult)> {
        let path = config.path.as_path();

        // Step 1: Create parent directory and file
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();

        // Step 2: Rebuild index
        let (index, recovery) = if file_len == 0 {
            (KeyIndex::new(), RecoveryResult::default())
        } else {
            let mut reader = BufReader::new(&mut file);
            IndexRecovery::recover(&mut reader, file_len)?
        };

        // Step 3: Anything past the used length must read as zero
        if file_len > recovery.used_len {
            file.set_len(recovery.used_len)?;
        }

        // Step 4: Reserve initial capacity
        let capacity = recovery.used_len.max(config.initial_capacity as u64);
        if capacity > recovery.used_len {
            file.set_len(capacity)?;
        }

        tracing::info!(
            path = %path.display(),
            records = recovery.records_recovered,
            used_len = recovery.used_len,
            file_len = recovery.file_len,
            "opened store file"
        );

        let backing = Self {
            path: path.to_path_buf(),
            file,
            capacity,
            compaction: config.compaction_buffer,
        };

        Ok((backing, index, recovery))
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        if offset.saturating_add(len) > self.capacity {
            return Err(StashError::corruption(
                offset,
                format!("access of {} bytes past file end ({})", len, self.capacity),
            ));
        }
        Ok(())
    }
}

impl Backing for FileBacking {
    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn resize(&mut self, capacity: u64) -> Result<()> {
        self.file.set_len(capacity)?;
        self.capacity = capacity;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len() as u64)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len() as u64)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Copies front to back through a bounded scratch buffer; `dst < src`
    /// keeps every chunk's source ahead of what has been overwritten.
    fn shift_left(&mut self, src: u64, dst: u64, len: u64) -> Result<()> {
        self.check_range(src, len)?;

        let scratch_len = self
            .compaction
            .scratch_len(usize::try_from(len).unwrap_or(usize::MAX))
            .max(1);
        let mut scratch = vec![0u8; scratch_len];

        let mut moved = 0u64;
        while moved < len {
            let chunk = (len - moved).min(scratch_len as u64) as usize;

            self.file.seek(SeekFrom::Start(src + moved))?;
            self.file.read_exact(&mut scratch[..chunk])?;

            self.file.seek(SeekFrom::Start(dst + moved))?;
            self.file.write_all(&scratch[..chunk])?;

            moved += chunk as u64;
        }

        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
