//! Converter Module
//!
//! Codec between typed entities and the payload bytes stored in records.
//! The engine never looks inside a payload; any encoding that round-trips
//! works.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Entity codec
///
/// `from_bytes(&to_bytes(&x)?)?` must equal `x`.
pub trait Converter: Clone + Send + Sync + 'static {
    /// Serialize an entity
    fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize an entity
    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl Converter for JsonConverter {
    fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact binary codec
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeConverter;

impl Converter for BincodeConverter {
    fn to_bytes<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }
}
