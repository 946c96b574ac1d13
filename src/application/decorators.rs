//! MessageHandler decorators.
//!
//! Each decorator exposes its wrapped handler through
//! [`MessageHandler::delegate`], so capability lookups such as
//! [`find_sub_protocols`](crate::ports::find_sub_protocols) can walk the chain.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::domain::session::CloseStatus;
use crate::ports::{HandlerError, MessageHandler, SessionHandle, TransportError};

/// Logs every lifecycle callback before delegating.
pub struct LoggingMessageHandler<H> {
    inner: H,
}

impl<H: MessageHandler> LoggingMessageHandler<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: MessageHandler> MessageHandler for LoggingMessageHandler<H> {
    async fn after_connection_established(
        &self,
        session: Arc<dyn SessionHandle>,
    ) -> Result<(), HandlerError> {
        debug!(session_id = %session.id(), transport = %session.transport(), "New session");
        self.inner.after_connection_established(session).await
    }

    async fn handle_message(
        &self,
        session: Arc<dyn SessionHandle>,
        message: String,
    ) -> Result<(), HandlerError> {
        trace!(session_id = %session.id(), message = %message, "Handling message");
        self.inner.handle_message(session, message).await
    }

    async fn handle_transport_error(&self, session: Arc<dyn SessionHandle>, error: &TransportError) {
        debug!(session_id = %session.id(), error = %error, "Transport error");
        self.inner.handle_transport_error(session, error).await
    }

    async fn after_connection_closed(&self, session: Arc<dyn SessionHandle>, status: &CloseStatus) {
        debug!(session_id = %session.id(), status = %status, "Session closed");
        self.inner.after_connection_closed(session, status).await
    }

    fn delegate(&self) -> Option<&dyn MessageHandler> {
        Some(&self.inner)
    }
}

/// Turns delegate failures into a session close with `1011`.
///
/// Errors from `after_connection_established` and `handle_message` are
/// logged and absorbed; the session is closed with
/// [`CloseStatus::SERVER_ERROR`] instead of being failed through the
/// transport error path.
pub struct ErrorTrappingMessageHandler<H> {
    inner: H,
}

impl<H: MessageHandler> ErrorTrappingMessageHandler<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    async fn trap(&self, session: Arc<dyn SessionHandle>, result: Result<(), HandlerError>) {
        if let Err(err) = result {
            error!(session_id = %session.id(), error = %err, "Unhandled handler error");
            session.close(CloseStatus::SERVER_ERROR).await;
        }
    }
}

#[async_trait]
impl<H: MessageHandler> MessageHandler for ErrorTrappingMessageHandler<H> {
    async fn after_connection_established(
        &self,
        session: Arc<dyn SessionHandle>,
    ) -> Result<(), HandlerError> {
        let result = self
            .inner
            .after_connection_established(session.clone())
            .await;
        self.trap(session, result).await;
        Ok(())
    }

    async fn handle_message(
        &self,
        session: Arc<dyn SessionHandle>,
        message: String,
    ) -> Result<(), HandlerError> {
        let result = self.inner.handle_message(session.clone(), message).await;
        self.trap(session, result).await;
        Ok(())
    }

    async fn handle_transport_error(&self, session: Arc<dyn SessionHandle>, error: &TransportError) {
        self.inner.handle_transport_error(session, error).await
    }

    async fn after_connection_closed(&self, session: Arc<dyn SessionHandle>, status: &CloseStatus) {
        self.inner.after_connection_closed(session, status).await
    }

    fn delegate(&self) -> Option<&dyn MessageHandler> {
        Some(&self.inner)
    }
}
