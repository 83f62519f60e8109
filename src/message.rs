//! Typed JSON envelope for text frames.
//!
//! Many servers exchange `{"type": ..., "data": ..., "timestamp": ...}` objects. [`Envelope`]
//! builds and reads that shape; anything that does not parse is wrapped as a `raw` envelope
//! instead of being rejected.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `type` of an envelope wrapping text that was not a JSON envelope.
pub const RAW_TYPE: &str = "raw";

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Envelope {
    /// Create an envelope stamped with the current time.
    pub fn new<S: Into<String>, D: Into<Value>>(kind: S, data: D) -> Self {
        Self {
            kind: kind.into(),
            data: data.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Parse a received text frame, falling back to a `raw` envelope holding the text.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_e| Self::new(RAW_TYPE, text))
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.kind == RAW_TYPE
    }

    /// Deserialize `data` into a concrete type.
    pub fn data_as<D: serde::de::DeserializeOwned>(&self) -> crate::Result<D> {
        Ok(D::deserialize(&self.data)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_envelope() {
        let envelope =
            Envelope::from_text(r#"{"type":"greeting","data":{"name":"ws"},"timestamp":1700000000000}"#);

        assert_eq!(envelope.kind, "greeting");
        assert_eq!(envelope.data, json!({"name": "ws"}));
        assert_eq!(envelope.timestamp, 1_700_000_000_000);
        assert!(!envelope.is_raw());
    }

    #[test]
    fn wraps_plain_text_as_raw() {
        let envelope = Envelope::from_text("hello there");

        assert!(envelope.is_raw());
        assert_eq!(envelope.data, json!("hello there"));
        assert!(envelope.timestamp > 0);
    }

    #[test]
    fn json_without_envelope_shape_is_raw() {
        let envelope = Envelope::from_text(r#"{"price": 42}"#);

        assert!(envelope.is_raw());
        assert_eq!(envelope.data, json!(r#"{"price": 42}"#));
    }

    #[test]
    fn serializes_type_field() {
        let envelope = Envelope {
            kind: "ping".to_owned(),
            data: Value::Null,
            timestamp: 5,
        };

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"type": "ping", "data": null, "timestamp": 5})
        );
    }

    #[test]
    fn data_as_deserializes() {
        #[derive(Deserialize)]
        struct Greeting {
            name: String,
        }

        let envelope = Envelope::new("greeting", json!({"name": "ws"}));
        let greeting: Greeting = envelope.data_as().unwrap();

        assert_eq!(greeting.name, "ws");
    }
}
