//! Recording `MessageHandler` for tests.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::domain::session::CloseStatus;
use crate::ports::{HandlerError, MessageHandler, SessionHandle, TransportError};

/// One observed handler callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEvent {
    Established,
    Message(String),
    TransportError(TransportError),
    Closed(CloseStatus),
}

/// Shared view of the events a [`RecordingMessageHandler`] observed.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<RwLock<Vec<HandlerEvent>>>);

impl EventLog {
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn snapshot(&self) -> Vec<HandlerEvent> {
        self.0
            .read()
            .expect("EventLog: lock poisoned")
            .clone()
    }

    fn push(&self, event: HandlerEvent) {
        self.0.write().expect("EventLog: lock poisoned").push(event);
    }
}

/// Handler that records every callback, optionally failing on demand.
#[derive(Debug, Default)]
pub struct RecordingMessageHandler {
    log: EventLog,
    fail_on_establish: bool,
    fail_on_message: bool,
    sub_protocols: Option<Vec<String>>,
}

impl RecordingMessageHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_establish() -> Self {
        Self {
            fail_on_establish: true,
            ..Self::default()
        }
    }

    pub fn failing_on_message() -> Self {
        Self {
            fail_on_message: true,
            ..Self::default()
        }
    }

    pub fn with_sub_protocols(mut self, protocols: &[&str]) -> Self {
        self.sub_protocols = Some(protocols.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn events(&self) -> Vec<HandlerEvent> {
        self.log.snapshot()
    }

    pub fn event_log(&self) -> EventLog {
        self.log.clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingMessageHandler {
    async fn after_connection_established(
        &self,
        _session: Arc<dyn SessionHandle>,
    ) -> Result<(), HandlerError> {
        self.log.push(HandlerEvent::Established);
        if self.fail_on_establish {
            return Err(HandlerError::new("refused"));
        }
        Ok(())
    }

    async fn handle_message(
        &self,
        _session: Arc<dyn SessionHandle>,
        message: String,
    ) -> Result<(), HandlerError> {
        self.log.push(HandlerEvent::Message(message));
        if self.fail_on_message {
            return Err(HandlerError::new("cannot handle message"));
        }
        Ok(())
    }

    async fn handle_transport_error(&self, _session: Arc<dyn SessionHandle>, error: &TransportError) {
        self.log.push(HandlerEvent::TransportError(error.clone()));
    }

    async fn after_connection_closed(&self, _session: Arc<dyn SessionHandle>, status: &CloseStatus) {
        self.log.push(HandlerEvent::Closed(status.clone()));
    }

    fn sub_protocols(&self) -> Option<Vec<String>> {
        self.sub_protocols.clone()
    }
}
