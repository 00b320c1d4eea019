//! Index Recovery
//!
//! Rebuilds the key index of an existing store file by walking its
//! record headers. Payloads are skipped, never decoded or decrypted.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, StashError};
use crate::record::{RecordHeader, HEADER_SIZE};

use super::KeyIndex;

/// Rebuilds the index of a store file
pub struct IndexRecovery;

/// Result of a recovery scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records found
    pub records_recovered: u64,

    /// End of the last record (the used-length mark)
    pub used_len: u64,

    /// Physical file length at scan time
    pub file_len: u64,
}

impl IndexRecovery {
    /// Scan `file_len` bytes of `reader` from offset 0
    ///
    /// Stops at the physical end or at a zero key length. A header, key
    /// or payload cut short by the end of the file is corruption and
    /// aborts the scan.
    pub fn recover<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<(KeyIndex, RecoveryResult)> {
        let mut index = KeyIndex::new();
        let mut pos = 0u64;

        reader.seek(SeekFrom::Start(0))?;

        while pos < file_len {
            let remaining = file_len - pos;

            // Step 1: Read as much of the header as the file holds
            let mut header = [0u8; HEADER_SIZE];
            let available = remaining.min(HEADER_SIZE as u64) as usize;
            reader.read_exact(&mut header[..available])?;

            // Step 2: Zero key length (or zero padding) ends the data
            let key_len_bytes = available.min(4);
            if header[..key_len_bytes].iter().all(|b| *b == 0) {
                break;
            }
            if available < HEADER_SIZE {
                return Err(StashError::corruption(
                    pos,
                    format!("truncated record header ({} of {} bytes)", available, HEADER_SIZE),
                ));
            }

            // Step 3: The whole record must fit in the file
            let header = RecordHeader::decode(&header);
            let size = header.record_size();
            if size > remaining {
                return Err(StashError::corruption(
                    pos,
                    format!("record of {} bytes extends past end of file ({} bytes left)", size, remaining),
                ));
            }

            // Step 4: Read the key, skip the payload
            let mut key = vec![0u8; header.key_len as usize];
            reader.read_exact(&mut key)?;
            reader.seek(SeekFrom::Current(header.payload_len as i64))?;

            if index.insert(key, pos).is_some() {
                return Err(StashError::corruption(pos, "duplicate key in store file"));
            }
            pos += size;
        }

        let result = RecoveryResult {
            records_recovered: index.len() as u64,
            used_len: pos,
            file_len,
        };

        Ok((index, result))
    }

    /// Recover a store file without opening it for writing
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let (_, result) = Self::recover(&mut reader, file_len)?;
        Ok(result)
    }
}
