//! JSON message codec.
//!
//! Outbound messages become a JSON array of strings. Inbound payloads are
//! either such an array or a single JSON string.

use serde_json::Value;

use crate::ports::{CodecError, MessageCodec};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMessageCodec;

impl MessageCodec for JsonMessageCodec {
    fn encode(&self, messages: &[String]) -> Result<String, CodecError> {
        serde_json::to_string(messages).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, content: &str) -> Result<Vec<String>, CodecError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| CodecError::Decode(e.to_string()))?;
        match value {
            Value::String(message) => Ok(vec![message]),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(message) => Ok(message),
                    other => Err(CodecError::Decode(format!(
                        "expected a string message, found {}",
                        other
                    ))),
                })
                .collect(),
            other => Err(CodecError::Decode(format!(
                "expected an array of strings, found {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_messages_as_json_array() {
        let codec = JsonMessageCodec;
        let encoded = codec
            .encode(&["a".to_string(), "quote\"d".to_string()])
            .unwrap();
        assert_eq!(encoded, r#"["a","quote\"d"]"#);
        assert_eq!(codec.encode(&[]).unwrap(), "[]");
    }

    #[test]
    fn encode_frame_produces_array_frame() {
        let frame = JsonMessageCodec
            .encode_frame(&["x".to_string(), "y".to_string()])
            .unwrap();
        assert_eq!(frame.content(), r#"a["x","y"]"#);
    }

    #[test]
    fn decodes_array_and_single_string() {
        let codec = JsonMessageCodec;
        assert_eq!(codec.decode(r#"["a","b"]"#).unwrap(), vec!["a", "b"]);
        assert_eq!(codec.decode(r#""solo""#).unwrap(), vec!["solo"]);
    }

    #[test]
    fn rejects_non_string_payloads() {
        let codec = JsonMessageCodec;
        assert!(matches!(codec.decode("[1]"), Err(CodecError::Decode(_))));
        assert!(matches!(codec.decode("{}"), Err(CodecError::Decode(_))));
        assert!(matches!(codec.decode("not json"), Err(CodecError::Decode(_))));
    }

    #[test]
    fn decode_input_rejects_invalid_utf8() {
        let result = JsonMessageCodec.decode_input(&[0xff, 0xfe]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
