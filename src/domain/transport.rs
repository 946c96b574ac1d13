//! Transport descriptors.
//!
//! A [`TransportType`] names one concrete carrier. It is only ever used as a
//! dispatch key and carries the static properties of that carrier.

use http::Method;
use std::fmt;

/// What a transport does for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportRole {
    /// Full-duplex native socket.
    Native,
    /// Accepts client-to-server messages only.
    Receiving,
    /// Delivers one batch of frames per request, then completes.
    Polling,
    /// Holds the response open and streams frames until a budget runs out.
    Streaming,
}

/// The carriers a session can run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    WebSocket,
    XhrPolling,
    XhrStreaming,
    XhrSend,
    JsonpPolling,
    JsonpSend,
    EventSource,
    HtmlFile,
}

impl TransportType {
    pub const ALL: [TransportType; 8] = [
        TransportType::WebSocket,
        TransportType::XhrPolling,
        TransportType::XhrStreaming,
        TransportType::XhrSend,
        TransportType::JsonpPolling,
        TransportType::JsonpSend,
        TransportType::EventSource,
        TransportType::HtmlFile,
    ];

    /// Parses the last segment of a transport URL.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.token() == token)
    }

    /// The URL segment naming this transport.
    pub fn token(&self) -> &'static str {
        match self {
            TransportType::WebSocket => "websocket",
            TransportType::XhrPolling => "xhr",
            TransportType::XhrStreaming => "xhr_streaming",
            TransportType::XhrSend => "xhr_send",
            TransportType::JsonpPolling => "jsonp",
            TransportType::JsonpSend => "jsonp_send",
            TransportType::EventSource => "eventsource",
            TransportType::HtmlFile => "htmlfile",
        }
    }

    pub fn http_method(&self) -> Method {
        match self {
            TransportType::XhrPolling
            | TransportType::XhrStreaming
            | TransportType::XhrSend
            | TransportType::JsonpSend => Method::POST,
            TransportType::WebSocket
            | TransportType::JsonpPolling
            | TransportType::EventSource
            | TransportType::HtmlFile => Method::GET,
        }
    }

    pub fn role(&self) -> TransportRole {
        match self {
            TransportType::WebSocket => TransportRole::Native,
            TransportType::XhrSend | TransportType::JsonpSend => TransportRole::Receiving,
            TransportType::XhrPolling | TransportType::JsonpPolling => TransportRole::Polling,
            TransportType::XhrStreaming | TransportType::EventSource | TransportType::HtmlFile => {
                TransportRole::Streaming
            }
        }
    }

    /// XHR transports answer CORS preflight requests.
    pub fn supports_cors(&self) -> bool {
        matches!(
            self,
            TransportType::XhrPolling | TransportType::XhrStreaming | TransportType::XhrSend
        )
    }

    /// Every HTTP transport forbids caching of its responses.
    pub fn sends_no_cache(&self) -> bool {
        !matches!(self, TransportType::WebSocket)
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
