//! Configuration for stashkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a stashkv store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the store file. Created on first open, recovered afterwards.
    pub path: PathBuf,

    /// Size in bytes the backing buffer starts with
    pub initial_capacity: usize,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the store file
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Bounds for the scratch buffer used when shifting file bytes
    pub compaction_buffer: CompactionBuffer,
}

/// File sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every mutation (safest, slowest)
    EveryWrite,

    /// fsync after N mutations (balanced durability/performance)
    EveryNWrites { count: usize },
}

/// Scratch buffer bounds for file compaction
///
/// The buffer used to move a tail of `remaining` bytes is
/// `min(remaining, max(floor, min(memory_budget / 2, ceiling)))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionBuffer {
    /// Smallest buffer worth allocating
    pub floor: usize,

    /// Hard upper bound regardless of budget
    pub ceiling: usize,

    /// Working memory the store may use; half of it is available for scratch
    pub memory_budget: usize,
}

impl CompactionBuffer {
    /// Scratch length for moving `remaining` bytes
    pub fn scratch_len(&self, remaining: usize) -> usize {
        let bounded = (self.memory_budget / 2).min(self.ceiling).max(self.floor);
        remaining.min(bounded)
    }
}

impl Default for CompactionBuffer {
    fn default() -> Self {
        Self {
            floor: 4 * 1024,                 // 4 KB
            ceiling: 1024 * 1024,            // 1 MB
            memory_budget: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./stashkv.db"),
            initial_capacity: 128,
            sync_strategy: SyncStrategy::EveryNWrites { count: 100 },
            compaction_buffer: CompactionBuffer::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the initial backing capacity (in bytes)
    pub fn initial_capacity(mut self, bytes: usize) -> Self {
        self.config.initial_capacity = bytes;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the compaction scratch buffer bounds
    pub fn compaction_buffer(mut self, bounds: CompactionBuffer) -> Self {
        self.config.compaction_buffer = bounds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
