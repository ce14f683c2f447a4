//! Payload serialization.
//!
//! # Data Flow
//! ```text
//! Request format (route `{format}` param, else route/default format)
//!     → SerializationProvider::resolve(format)
//!     → Codec::decode (request body → serde_json::Value)
//!     → handler / postprocessors work with Payload::Value
//!     → Codec::encode (Payload::Value → bytes) before the finally stage
//! ```
//!
//! # Design Decisions
//! - Codecs work on `serde_json::Value` so they stay object safe
//! - The provider is resolved once per process (see `lifecycle::context`)

pub mod json;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

pub use json::JsonCodec;

/// Codec failure.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to decode payload: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Encodes and decodes payloads for one wire format.
pub trait Codec: Send + Sync {
    /// Content-Type written on encoded responses.
    fn content_type(&self) -> &'static str;

    fn encode(&self, value: &serde_json::Value) -> Result<Bytes, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, CodecError>;
}

/// Resolves a format name to its codec.
pub trait SerializationProvider: Send + Sync {
    fn resolve(&self, format: &str) -> Option<Arc<dyn Codec>>;

    /// Format used when the request does not select one.
    fn default_format(&self) -> &str;
}

/// Provider backed by a format table; ships with JSON.
pub struct DefaultSerializationProvider {
    codecs: HashMap<String, Arc<dyn Codec>>,
    default_format: String,
}

impl DefaultSerializationProvider {
    pub fn new() -> Self {
        let mut codecs: HashMap<String, Arc<dyn Codec>> = HashMap::new();
        codecs.insert("json".to_string(), Arc::new(JsonCodec::new()));
        Self {
            codecs,
            default_format: "json".to_string(),
        }
    }

    /// Register (or replace) the codec for `format`.
    pub fn add(&mut self, format: impl Into<String>, codec: Arc<dyn Codec>) -> &mut Self {
        self.codecs.insert(format.into().to_ascii_lowercase(), codec);
        self
    }

    pub fn set_default_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.default_format = format.into().to_ascii_lowercase();
        self
    }

    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }
}

impl Default for DefaultSerializationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializationProvider for DefaultSerializationProvider {
    fn resolve(&self, format: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(&format.to_ascii_lowercase()).cloned()
    }

    fn default_format(&self) -> &str {
        &self.default_format
    }
}
