//! Receiving transports: `xhr_send` and `jsonp_send`.
//!
//! Decode failures are local to the one exchange. They answer 500 and leave
//! the session exactly as it was.

use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::request::Parts;
use std::sync::Arc;
use tracing::debug;

use crate::application::Session;
use crate::domain::session::Attributes;
use crate::domain::transport::TransportType;

use super::{HttpTransportError, TransportHandler};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

pub struct ReceivingTransportHandler {
    transport: TransportType,
}

impl ReceivingTransportHandler {
    pub fn xhr_send() -> Self {
        Self {
            transport: TransportType::XhrSend,
        }
    }

    pub fn jsonp_send() -> Self {
        Self {
            transport: TransportType::JsonpSend,
        }
    }

    /// Extracts the message payload; `jsonp_send` form posts carry it in `d`.
    fn payload(&self, request: &Parts, body: &Bytes) -> Option<Vec<u8>> {
        let is_form = request
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with(FORM_URLENCODED));

        let payload = if self.transport == TransportType::JsonpSend && is_form {
            url::form_urlencoded::parse(body)
                .find(|(key, _)| key == "d")
                .map(|(_, value)| value.into_owned().into_bytes())?
        } else {
            body.to_vec()
        };
        (!payload.is_empty()).then_some(payload)
    }
}

#[async_trait]
impl TransportHandler for ReceivingTransportHandler {
    fn transport_type(&self) -> TransportType {
        self.transport
    }

    async fn handle_request(
        &self,
        request: &Parts,
        body: Bytes,
        session: Arc<Session>,
        _attributes: Attributes,
    ) -> Result<Response, HttpTransportError> {
        let payload = self
            .payload(request, &body)
            .ok_or(HttpTransportError::PayloadExpected)?;

        let messages = session.codec().decode_input(&payload).map_err(|e| {
            debug!(session_id = %session.id(), error = %e, "Failed to decode request body");
            HttpTransportError::BrokenJson
        })?;

        session.handle_inbound(messages).await;

        let content_type = [(CONTENT_TYPE, "text/plain;charset=UTF-8")];
        Ok(match self.transport {
            TransportType::JsonpSend => (StatusCode::OK, content_type, "ok").into_response(),
            _ => (StatusCode::NO_CONTENT, content_type).into_response(),
        })
    }
}
