//! Delivery payloads, classified once at the call boundary.

use serde_json::Value;

/// What a flush hands to the transport.
///
/// The variant decides the content type; strategies never re-inspect the
/// data.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text.
    Text(String),
    /// Raw bytes with their intrinsic content type.
    Binary { mime: String, bytes: Vec<u8> },
    /// Structured data, serialized as JSON on the wire.
    Json(Value),
}

impl Payload {
    /// True when there is nothing worth sending.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Binary { bytes, .. } => bytes.is_empty(),
            Self::Json(value) => match value {
                Value::Null => true,
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            },
        }
    }
}
