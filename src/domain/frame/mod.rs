//! Wire frames exchanged over a logical session.
//!
//! Every frame is a short text whose first character names its type:
//!
//! | Frame | Content |
//! |---|---|
//! | Open | `o` |
//! | Heartbeat | `h` |
//! | Message | `a["m1","m2"]` or `m"m1"` / `mnull` |
//! | Close | `c[3000,"Go away!"]` |
//!
//! A [`Frame`] can only be built from content that is a valid encoding of
//! its type, so holders never need to re-validate it.

mod format;

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::session::CloseStatus;

pub use format::{validate_callback, FrameFormat};

const OPEN: &str = "o";
const HEARTBEAT: &str = "h";

/// The four frame kinds of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Open,
    Heartbeat,
    Message,
    Close,
}

/// Errors raised when text cannot be turned into a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Frame content cannot be empty")]
    Empty,

    #[error("Unexpected frame type '{0}'")]
    UnknownType(char),

    #[error("Malformed {frame_type:?} frame: {reason}")]
    Malformed { frame_type: FrameType, reason: String },

    #[error("Invalid callback name '{0}'")]
    InvalidCallback(String),
}

impl FrameError {
    fn malformed(frame_type: FrameType, reason: impl Into<String>) -> Self {
        FrameError::Malformed {
            frame_type,
            reason: reason.into(),
        }
    }
}

/// One protocol-level unit of the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    frame_type: FrameType,
    content: String,
}

impl Frame {
    /// The OPEN frame, `o`.
    pub fn open() -> Self {
        Self {
            frame_type: FrameType::Open,
            content: OPEN.to_string(),
        }
    }

    /// The HEARTBEAT frame, `h`.
    pub fn heartbeat() -> Self {
        Self {
            frame_type: FrameType::Heartbeat,
            content: HEARTBEAT.to_string(),
        }
    }

    /// Encodes a batch of messages as an array frame. An empty batch still
    /// produces `a[]`.
    pub fn messages<S: AsRef<str>>(messages: &[S]) -> Self {
        let array = Value::Array(
            messages
                .iter()
                .map(|m| Value::String(m.as_ref().to_string()))
                .collect(),
        );
        Self::from_encoded_array(array.to_string())
    }

    /// Builds an array frame from JSON produced by a message codec.
    ///
    /// `json_array` must already be a JSON array of strings.
    pub fn from_encoded_array(json_array: String) -> Self {
        let mut content = String::with_capacity(json_array.len() + 1);
        content.push('a');
        content.push_str(&json_array);
        Self {
            frame_type: FrameType::Message,
            content,
        }
    }

    /// Encodes the single-message variant: `m` followed by a JSON string, or
    /// `mnull` when there is no payload.
    pub fn single_message(payload: Option<&str>) -> Self {
        let value = payload
            .map(|p| Value::String(p.to_string()))
            .unwrap_or(Value::Null);
        Self {
            frame_type: FrameType::Message,
            content: format!("m{}", value),
        }
    }

    /// Encodes a CLOSE frame, e.g. `c[3000,"Go away!"]`.
    pub fn close(code: u16, reason: &str) -> Self {
        Self {
            frame_type: FrameType::Close,
            content: format!("c[{},{}]", code, Value::String(reason.to_string())),
        }
    }

    /// Encodes a CLOSE frame for a close status.
    pub fn close_with(status: &CloseStatus) -> Self {
        Self::close(status.code(), status.reason())
    }

    /// Parses frame text received from a peer.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let first = raw.chars().next().ok_or(FrameError::Empty)?;
        let frame_type = match first {
            'o' => FrameType::Open,
            'h' => FrameType::Heartbeat,
            'a' | 'm' => FrameType::Message,
            'c' => FrameType::Close,
            other => return Err(FrameError::UnknownType(other)),
        };
        let payload = &raw[1..];

        match (first, frame_type) {
            (_, FrameType::Open | FrameType::Heartbeat) if !payload.is_empty() => {
                return Err(FrameError::malformed(frame_type, "unexpected payload"));
            }
            ('a', _) => {
                serde_json::from_str::<Vec<String>>(payload)
                    .map_err(|e| FrameError::malformed(frame_type, e.to_string()))?;
            }
            ('m', _) => {
                serde_json::from_str::<Option<String>>(payload)
                    .map_err(|e| FrameError::malformed(frame_type, e.to_string()))?;
            }
            ('c', _) => {
                serde_json::from_str::<(u16, String)>(payload)
                    .map_err(|e| FrameError::malformed(frame_type, e.to_string()))?;
            }
            _ => {}
        }

        Ok(Self {
            frame_type,
            content: raw.to_string(),
        })
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    /// The full encoded content, discriminator included.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    /// The text after the discriminator for MESSAGE and CLOSE frames;
    /// `None` for OPEN and HEARTBEAT.
    pub fn frame_data(&self) -> Option<&str> {
        match self.frame_type {
            FrameType::Open | FrameType::Heartbeat => None,
            FrameType::Message | FrameType::Close => Some(&self.content[1..]),
        }
    }

    /// Decodes the messages carried by a MESSAGE frame.
    pub fn decode_messages(&self) -> Result<Vec<String>, FrameError> {
        let data = match (self.frame_type, self.frame_data()) {
            (FrameType::Message, Some(data)) => data,
            (other, _) => return Err(FrameError::malformed(other, "not a message frame")),
        };
        if self.content.starts_with('m') {
            let single = serde_json::from_str::<Option<String>>(data)
                .map_err(|e| FrameError::malformed(FrameType::Message, e.to_string()))?;
            return Ok(single.into_iter().collect());
        }
        serde_json::from_str::<Vec<String>>(data)
            .map_err(|e| FrameError::malformed(FrameType::Message, e.to_string()))
    }

    /// Decodes the status carried by a CLOSE frame.
    pub fn close_status(&self) -> Option<CloseStatus> {
        if self.frame_type != FrameType::Close {
            return None;
        }
        let (code, reason) = serde_json::from_str::<(u16, String)>(self.frame_data()?).ok()?;
        Some(CloseStatus::new(code, reason))
    }
}

impl FromStr for Frame {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}
