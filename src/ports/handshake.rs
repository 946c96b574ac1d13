//! Handshake ports - negotiation context and interceptors.
//!
//! A [`HandshakeContext`] is created for every negotiation attempt and dropped
//! once the upgrade or transport dispatch decision is made. Interceptors read
//! the request and may adjust the response, add attributes, or veto the
//! negotiation.

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::request::Parts;
use http::StatusCode;
use thiserror::Error;

use crate::domain::session::{Attributes, Principal};

/// Internal failure while performing a handshake.
///
/// This is never used for a client request that merely fails protocol
/// requirements; those produce a rejected outcome with a normal response.
#[derive(Debug, Error)]
pub enum HandshakeFailure {
    #[error("WebSocket upgrade failed: {0}")]
    Upgrade(String),
}

/// One `Sec-WebSocket-Extensions` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    name: String,
    parameters: Vec<(String, Option<String>)>,
}

impl Extension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.parameters.push((key.into(), value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[(String, Option<String>)] {
        &self.parameters
    }

    /// Parses every `Sec-WebSocket-Extensions` header value of a request,
    /// e.g. `permessage-deflate; client_max_window_bits, x-custom`.
    pub fn parse_headers(headers: &HeaderMap) -> Vec<Extension> {
        headers
            .get_all(http::header::SEC_WEBSOCKET_EXTENSIONS)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(Self::parse_one)
            .collect()
    }

    fn parse_one(raw: &str) -> Option<Extension> {
        let mut parts = raw.split(';').map(str::trim);
        let name = parts.next().filter(|n| !n.is_empty())?;
        let parameters = parts
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), Some(v.trim().trim_matches('"').to_string())),
                None => (p.to_string(), None),
            })
            .collect();
        Some(Extension {
            name: name.to_string(),
            parameters,
        })
    }
}

/// Response under construction while interceptors and the handshake
/// handler run.
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Default for HandshakeResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }
}

/// Per-attempt negotiation state.
#[derive(Debug)]
pub struct HandshakeContext {
    pub request: Parts,
    pub response: HandshakeResponse,
    pub sub_protocol: Option<String>,
    pub extensions: Vec<Extension>,
    pub attributes: Attributes,
}

impl HandshakeContext {
    pub fn new(request: Parts) -> Self {
        Self {
            request,
            response: HandshakeResponse::default(),
            sub_protocol: None,
            extensions: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    /// The authenticated user, if the host stack put one in the request
    /// extensions.
    pub fn principal(&self) -> Option<Principal> {
        self.request.extensions.get::<Principal>().cloned()
    }

    /// Finalizes the response as a negotiation failure.
    pub fn reject(&mut self, status: StatusCode, body: impl Into<String>) {
        self.response.status = status;
        self.response.body = body.into();
        if !self.response.body.is_empty() {
            self.response.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain;charset=UTF-8"),
            );
        }
    }

    /// Builds the HTTP response accumulated so far.
    pub fn into_response(mut self) -> Response {
        self.take_response()
    }

    /// Moves the accumulated response out, leaving a fresh 200 behind.
    pub fn take_response(&mut self) -> Response {
        let accumulated = std::mem::take(&mut self.response);
        let mut response = Response::new(Body::from(accumulated.body));
        *response.status_mut() = accumulated.status;
        *response.headers_mut() = accumulated.headers;
        response
    }
}

/// Hook run around every negotiation.
///
/// `before_handshake` runs in registration order; returning false aborts the
/// negotiation, after which only the interceptors that already accepted get
/// `after_handshake`, in reverse order.
#[async_trait]
pub trait HandshakeInterceptor: Send + Sync {
    async fn before_handshake(&self, context: &mut HandshakeContext) -> bool;

    async fn after_handshake(
        &self,
        _context: &HandshakeContext,
        _failure: Option<&HandshakeFailure>,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    #[test]
    fn parse_headers_reads_names_and_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::SEC_WEBSOCKET_EXTENSIONS,
            HeaderValue::from_static("permessage-deflate; client_max_window_bits, x-foo; a=\"1\""),
        );
        let extensions = Extension::parse_headers(&headers);
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0].name(), "permessage-deflate");
        assert_eq!(
            extensions[0].parameters(),
            &[("client_max_window_bits".to_string(), None)]
        );
        assert_eq!(
            extensions[1],
            Extension::new("x-foo").with_parameter("a", Some("1".to_string()))
        );
    }

    #[test]
    fn reject_sets_status_and_text_body() {
        let (parts, _) = Request::new(()).into_parts();
        let mut ctx = HandshakeContext::new(parts);
        ctx.reject(StatusCode::FORBIDDEN, "nope");
        let response = ctx.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain;charset=UTF-8"
        );
    }

    #[test]
    fn principal_comes_from_request_extensions() {
        let mut request = Request::new(());
        request.extensions_mut().insert(Principal::new("alice"));
        let (parts, _) = request.into_parts();
        let ctx = HandshakeContext::new(parts);
        assert_eq!(ctx.principal(), Some(Principal::new("alice")));
    }
}
