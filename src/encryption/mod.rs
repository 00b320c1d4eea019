//! Encryption Module
//!
//! Pluggable cipher applied to record payloads at the storage boundary.
//!
//! ## Responsibilities
//! - Encrypt payloads before they reach the backing buffer
//! - Decrypt payloads on every read
//! - Leave keys untouched so ordering and prefix scans keep working
//!
//! The record key is handed to both operations so implementations can
//! bind a ciphertext to the key it was stored under.

mod aes;

use crate::error::Result;

pub use aes::{AesGcmEncryption, EncryptionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Cipher hook used by [`crate::storage::BufferStorage`]
///
/// `decrypt(key, encrypt(key, p)?)?` must return `p` exactly.
pub trait Encryption: Send + Sync {
    /// Encrypt a payload stored under `key`
    fn encrypt(&self, key: &[u8], payload: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a payload read from under `key`
    fn decrypt(&self, key: &[u8], payload: &[u8]) -> Result<Vec<u8>>;
}

/// Identity cipher (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncryption;

impl Encryption for NoEncryption {
    fn encrypt(&self, _key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        Ok(payload.to_vec())
    }

    fn decrypt(&self, _key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        Ok(payload.to_vec())
    }
}
