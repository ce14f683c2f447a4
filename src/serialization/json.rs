//! JSON codec.

use bytes::Bytes;

use super::{Codec, CodecError};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, value: &serde_json::Value) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, CodecError> {
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_decodes_to_null() {
        assert_eq!(JsonCodec.decode(b"").unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn malformed_body_is_decode_error() {
        assert!(matches!(
            JsonCodec.decode(b"{not json"),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn encodes_compact_json() {
        let bytes = JsonCodec.encode(&json!({"id": 42})).unwrap();
        assert_eq!(&bytes[..], br#"{"id":42}"#);
    }
}
