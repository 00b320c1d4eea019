//! AES-256-GCM payload encryption

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, StashError};

use super::Encryption;

/// AES-256 key size (bytes)
pub const KEY_SIZE: usize = 32;
/// GCM nonce size (bytes)
pub const NONCE_SIZE: usize = 12;
/// GCM tag size (bytes)
pub const TAG_SIZE: usize = 16;

/// AES-256-GCM key, zeroized on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Random key from the thread RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Key from raw bytes; the slice must be exactly [`KEY_SIZE`] long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StashError::Encryption(format!(
                "invalid key size: expected {KEY_SIZE}, got {}",
                bytes.len()
            )));
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Authenticated payload encryption
///
/// ```text
/// ┌─────────────┬────────────┬──────────┐
/// │ nonce (12B) │ ciphertext │ tag (16B)│
/// └─────────────┴────────────┴──────────┘
/// ```
///
/// The record key is the associated data, so a payload moved under
/// another key fails to decrypt. Output length depends only on the
/// plaintext length
pub struct AesGcmEncryption {
    cipher: Aes256Gcm,
}

impl AesGcmEncryption {
    pub fn new(key: &EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }
}

impl Encryption for AesGcmEncryption {
    fn encrypt(&self, key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, Payload { msg: payload, aad: key })
            .map_err(|_| StashError::Encryption("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend(ciphertext);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StashError::Encryption(format!(
                "ciphertext too short: {} bytes",
                payload.len()
            )));
        }

        let (nonce, sealed) = payload.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad: key })
            .map_err(|_| StashError::Encryption("decryption failed".to_string()))
    }
}

impl std::fmt::Debug for AesGcmEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEncryption").finish_non_exhaustive()
    }
}
