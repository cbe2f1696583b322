//! Codec for request and response documents
//!
//! Currently only JSON is supported, but the enum allows for future
//! extensibility (e.g. CBOR, SMILE).
//!
//! # Example
//!
//! ```
//! use seawire_common::Codec;
//! use serde_json::json;
//!
//! let codec = Codec::new();
//! let encoded = codec.encode(&json!({"query": {"match_all": {}}})).unwrap();
//! let decoded: serde_json::Value = codec.decode(&encoded).unwrap();
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::protocol::PipelineError;

/// Codec for encoding/decoding documents on the wire
#[derive(Debug, Clone)]
pub enum Codec {
    /// JSON codec (currently the only supported format)
    Json(JsonCodec),
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new()
    }
}

impl Codec {
    pub fn new() -> Self {
        Codec::Json(JsonCodec)
    }

    /// Encode a document to wire bytes
    pub fn encode<T: Serialize>(&self, document: &T) -> Result<Bytes, PipelineError> {
        match self {
            Codec::Json(_) => JsonCodec::encode(document),
        }
    }

    /// Decode a document from wire bytes
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, PipelineError> {
        match self {
            Codec::Json(_) => JsonCodec::decode(data),
        }
    }
}

/// JSON codec backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode<T: Serialize>(document: &T) -> Result<Bytes, PipelineError> {
        serde_json::to_vec(document)
            .map(Bytes::from)
            .map_err(|e| {
                PipelineError::unexpected(format!("failed to encode document: {e}")).with_source(e)
            })
    }

    pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, PipelineError> {
        serde_json::from_slice(data).map_err(|e| {
            PipelineError::unexpected(format!("failed to decode response document: {e}"))
                .with_source(e)
        })
    }
}
