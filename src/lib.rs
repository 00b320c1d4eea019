//! # StashKV
//!
//! An embedded key-value store with:
//! - Append-and-compact record layout (no tombstones, no background merge)
//! - Crash recovery by scanning the store file on open
//! - Pluggable payload encryption (AES-256-GCM included)
//! - Typed entity collections with sequence ids
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │        (description registry + key/value namespace)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Collection<T, Converter>                    │
//! │          ("Name:id" keys, sequence ids, Call wrappers)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    dyn Storage                              │
//! │      BufferStorage<B> ── Encryption (outside the lock)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Memory    │          │    File     │
//!   │  (BytesMut) │          │ (recovered) │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod encryption;
pub mod storage;
pub mod converter;
pub mod description;
pub mod collection;
pub mod call;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StashError};
pub use config::{CompactionBuffer, Config, SyncStrategy};
pub use record::{OrderedKey, Record};
pub use encryption::{AesGcmEncryption, Encryption, EncryptionKey, NoEncryption};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use converter::{BincodeConverter, Converter, JsonConverter};
pub use description::{Description, Entity};
pub use collection::Collection;
pub use call::{Call, Executor, InlineExecutor, ThreadExecutor};
pub use engine::{Engine, EngineBuilder};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StashKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
