//! Body serialization used by the client façades.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use crate::{HttpClientError, Result};

/// Serializer for request and response bodies.
pub trait Serialization: Send + Sync {
    /// Media type produced and accepted, sent as `Content-Type` and `Accept`.
    fn content_type(&self) -> &str;

    /// Serialize a value into a body.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes>;

    /// Deserialize a body.
    fn deserialize<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T>;
}

/// JSON serializer backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerialization;

impl Serialization for JsonSerialization {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| HttpClientError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T> {
        serde_json::from_slice(body).map_err(|e| HttpClientError::Serialization(e.to_string()))
    }
}
