//! HTTP adapters - transport endpoints.
//!
//! Every URL of the form `{prefix}/{server}/{session}/{transport}` is
//! dispatched by [`TransportService`] to the [`TransportHandler`] bound to
//! that transport, or to the native handshake for `websocket`.

mod error;
mod exchange;
mod receiving;
mod sending;
mod service;

pub use error::HttpTransportError;
pub use exchange::{ExchangeMode, HttpExchange};
pub use receiving::ReceivingTransportHandler;
pub use sending::SendingTransportHandler;
pub use service::{TransportService, TransportServiceBuilder};

use async_trait::async_trait;
use axum::response::Response;
use bytes::Bytes;
use http::request::Parts;
use std::sync::Arc;

use crate::application::Session;
use crate::domain::session::Attributes;
use crate::domain::transport::TransportType;

/// Serves one HTTP transport for an existing or freshly created session.
#[async_trait]
pub trait TransportHandler: Send + Sync {
    fn transport_type(&self) -> TransportType;

    /// Request-level checks that run before any session is looked up or
    /// created.
    fn check_request(&self, _request: &Parts) -> Result<(), HttpTransportError> {
        Ok(())
    }

    /// `attributes` is non-empty only for the request that created the session.
    async fn handle_request(
        &self,
        request: &Parts,
        body: Bytes,
        session: Arc<Session>,
        attributes: Attributes,
    ) -> Result<Response, HttpTransportError>;
}
