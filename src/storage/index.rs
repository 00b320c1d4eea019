//! Key index
//!
//! Ordered map from key to record offset within the backing.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::record::OrderedKey;

/// In-memory index: key → offset of its record
///
/// Kept strictly in sync with the backing: the spans
/// `[offset, offset + record size)` of all entries tile `[0, used_len)`.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    entries: BTreeMap<OrderedKey, u64>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<OrderedKey>, offset: u64) -> Option<u64> {
        self.entries.insert(key.into(), offset)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<u64> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pull every entry located after `removed_at` down by `by` bytes
    pub fn shift_after(&mut self, removed_at: u64, by: u64) {
        for offset in self.entries.values_mut() {
            if *offset > removed_at {
                *offset -= by;
            }
        }
    }

    /// Keys starting with `prefix`, in key order
    ///
    /// Walks the ordered range from `prefix` and stops at the first key
    /// that no longer carries it.
    pub fn prefixed(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.entries
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.has_prefix(prefix))
            .map(|(key, _)| key.as_bytes().to_vec())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrderedKey, u64)> {
        self.entries.iter().map(|(key, offset)| (key, *offset))
    }

    /// Owned copy of every (key, offset) pair, in key order
    pub fn snapshot(&self) -> Vec<(Vec<u8>, u64)> {
        self.iter()
            .map(|(key, offset)| (key.as_bytes().to_vec(), offset))
            .collect()
    }
}
