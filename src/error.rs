//! Error types for stashkv
//!
//! Provides a unified error type for all operations. A missing key is
//! never an error: lookups return `Ok(None)` instead.

use thiserror::Error;

/// Result type alias using StashError
pub type Result<T> = std::result::Result<T, StashError>;

/// Unified error type for stashkv operations
#[derive(Debug, Error)]
pub enum StashError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Store corruption detected at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // Encryption Errors
    // -------------------------------------------------------------------------
    #[error("Encryption error: {0}")]
    Encryption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StashError {
    pub(crate) fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        StashError::Corruption {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StashError {
    fn from(err: serde_json::Error) -> Self {
        StashError::Codec(err.to_string())
    }
}

impl From<bincode::Error> for StashError {
    fn from(err: bincode::Error) -> Self {
        StashError::Codec(err.to_string())
    }
}
