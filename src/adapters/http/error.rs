//! HTTP error mapping for the transport endpoints.

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::ports::HandshakeFailure;

/// Failures answered directly by the transport endpoints.
#[derive(Debug, Error)]
pub enum HttpTransportError {
    #[error("Not found")]
    NotFound,

    #[error("Payload expected.")]
    PayloadExpected,

    #[error("Broken JSON encoding.")]
    BrokenJson,

    #[error("\"callback\" parameter required")]
    CallbackRequired,

    #[error("invalid \"callback\" parameter")]
    InvalidCallback,

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error(transparent)]
    Handshake(#[from] HandshakeFailure),
}

impl IntoResponse for HttpTransportError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpTransportError::NotFound => StatusCode::NOT_FOUND,
            HttpTransportError::PayloadExpected
            | HttpTransportError::BrokenJson
            | HttpTransportError::CallbackRequired
            | HttpTransportError::InvalidCallback
            | HttpTransportError::BodyRead(_)
            | HttpTransportError::Handshake(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match &self {
            HttpTransportError::NotFound => String::new(),
            other => other.to_string(),
        };
        (
            status,
            [(CONTENT_TYPE, "text/plain;charset=UTF-8")],
            body,
        )
            .into_response()
    }
}
