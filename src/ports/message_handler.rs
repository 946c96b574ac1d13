//! MessageHandler port - the application code behind a session.
//!
//! Handlers see a [`SessionHandle`] rather than the session internals, so the
//! same handler runs unchanged over every carrier.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::session::{Attributes, CloseStatus, Principal, SessionId, SessionState};
use crate::domain::transport::TransportType;

use super::TransportError;

/// Failure reported by application code.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<TransportError> for HandlerError {
    fn from(err: TransportError) -> Self {
        HandlerError::with_source("transport failure", err)
    }
}

/// The application's view of a logical session.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    fn id(&self) -> &SessionId;

    /// The carrier the session was created over.
    fn transport(&self) -> TransportType;

    fn principal(&self) -> Option<&Principal>;

    async fn state(&self) -> SessionState;

    /// A copy of the attributes captured at handshake time. Empty once the
    /// session has closed and `after_connection_closed` has returned.
    async fn attributes(&self) -> Attributes;

    /// Queues a message for delivery. A no-op once the session is closed.
    async fn send_message(&self, message: String) -> Result<(), TransportError>;

    /// Closes the session. A no-op once the session is closed.
    async fn close(&self, status: CloseStatus);
}

/// Application callbacks for one session.
///
/// `handle_transport_error` and `after_connection_closed` are each invoked at
/// most once per session.
///
/// # Example
///
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl MessageHandler for Echo {
///     async fn handle_message(
///         &self,
///         session: Arc<dyn SessionHandle>,
///         message: String,
///     ) -> Result<(), HandlerError> {
///         session.send_message(message).await?;
///         Ok(())
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn after_connection_established(
        &self,
        session: Arc<dyn SessionHandle>,
    ) -> Result<(), HandlerError>;

    async fn handle_message(
        &self,
        session: Arc<dyn SessionHandle>,
        message: String,
    ) -> Result<(), HandlerError>;

    async fn handle_transport_error(&self, session: Arc<dyn SessionHandle>, error: &TransportError);

    async fn after_connection_closed(&self, session: Arc<dyn SessionHandle>, status: &CloseStatus);

    /// Sub-protocols this handler speaks, if it negotiates any.
    fn sub_protocols(&self) -> Option<Vec<String>> {
        None
    }

    /// The wrapped handler, for decorators. `None` ends the chain.
    fn delegate(&self) -> Option<&dyn MessageHandler> {
        None
    }
}

/// Walks a decorator chain and returns the sub-protocols of the first
/// handler that declares any.
pub fn find_sub_protocols(handler: &dyn MessageHandler) -> Vec<String> {
    let mut current = Some(handler);
    while let Some(h) = current {
        if let Some(protocols) = h.sub_protocols() {
            return protocols;
        }
        current = h.delegate();
    }
    Vec::new()
}
