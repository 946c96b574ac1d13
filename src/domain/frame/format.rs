//! Transport-specific packaging of frames.
//!
//! A format is a pure function of the transport kind (plus a callback name
//! for script based transports). Formats hold no state and can be shared
//! freely between sessions.

use serde_json::Value;

use super::{Frame, FrameError};

/// How a frame is wrapped before it is written to a carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFormat {
    /// Content unchanged, used by native sockets.
    Raw,
    /// Content followed by `\n`, used by the XHR transports.
    Newline,
    /// A `data:` server-sent event.
    EventSource,
    /// A `<script>` chunk calling the `p` function of the htmlfile prelude.
    HtmlFile,
    /// A JSONP callback invocation.
    Jsonp { callback: String },
}

impl FrameFormat {
    /// Builds a JSONP format after validating the callback name.
    pub fn jsonp(callback: &str) -> Result<Self, FrameError> {
        validate_callback(callback)?;
        Ok(FrameFormat::Jsonp {
            callback: callback.to_string(),
        })
    }

    pub fn format(&self, frame: &Frame) -> String {
        let content = frame.content();
        match self {
            FrameFormat::Raw => content.to_string(),
            FrameFormat::Newline => format!("{}\n", content),
            FrameFormat::EventSource => format!("data: {}\r\n\r\n", content),
            FrameFormat::HtmlFile => {
                format!("<script>\np({});\n</script>\r\n", script_string(content))
            }
            FrameFormat::Jsonp { callback } => {
                format!("/**/{}({});\r\n", callback, script_string(content))
            }
        }
    }
}

/// Callback names end up inside a script, so only identifier characters and
/// dots are allowed.
pub fn validate_callback(callback: &str) -> Result<(), FrameError> {
    let valid = !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(FrameError::InvalidCallback(callback.to_string()))
    }
}

/// Quotes frame content as a JavaScript string literal that is also safe to
/// embed in HTML.
fn script_string(content: &str) -> String {
    Value::String(content.to_string())
        .to_string()
        .replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}
