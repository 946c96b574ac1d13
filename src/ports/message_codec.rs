//! MessageCodec port - JSON encoding of application messages.

use thiserror::Error;

use crate::domain::frame::Frame;

/// Errors raised by a message codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Failed to encode messages: {0}")]
    Encode(String),

    #[error("Failed to decode messages: {0}")]
    Decode(String),
}

/// Encodes outbound message batches and decodes inbound ones.
pub trait MessageCodec: Send + Sync {
    /// Encodes messages as a JSON array of strings.
    fn encode(&self, messages: &[String]) -> Result<String, CodecError>;

    /// Decodes a JSON array of strings received from a client.
    fn decode(&self, content: &str) -> Result<Vec<String>, CodecError>;

    /// Decodes a raw request body.
    fn decode_input(&self, body: &[u8]) -> Result<Vec<String>, CodecError> {
        let content =
            std::str::from_utf8(body).map_err(|e| CodecError::Decode(e.to_string()))?;
        self.decode(content)
    }

    /// Encodes messages straight into a MESSAGE frame.
    fn encode_frame(&self, messages: &[String]) -> Result<Frame, CodecError> {
        Ok(Frame::from_encoded_array(self.encode(messages)?))
    }
}
