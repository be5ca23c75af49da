//! Content codec
//!
//! Symmetric encode/decode of JSON-representable value trees. The same codec
//! serializes collection contents and the directory payload.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, VaultError};

/// Encoding used for collection contents and the header payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Compact binary encoding (MessagePack, structs as maps)
    #[default]
    MessagePack,

    /// Plain-text JSON
    Json,
}

impl Codec {
    /// Encode a value to bytes
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::MessagePack => rmp_serde::to_vec_named(value)
                .map_err(|e| VaultError::Serialization(format!("MessagePack encode failed: {}", e))),
            Codec::Json => serde_json::to_vec(value)
                .map_err(|e| VaultError::Serialization(format!("JSON encode failed: {}", e))),
        }
    }

    /// Decode a value from bytes
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::MessagePack => rmp_serde::from_slice(bytes)
                .map_err(|e| VaultError::Serialization(format!("MessagePack decode failed: {}", e))),
            Codec::Json => serde_json::from_slice(bytes)
                .map_err(|e| VaultError::Serialization(format!("JSON decode failed: {}", e))),
        }
    }

    /// Short name for logs and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            Codec::MessagePack => "msgpack",
            Codec::Json => "json",
        }
    }
}
