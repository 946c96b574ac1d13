//! SocketSessionAdapter - binds one native socket to a logical session.
//!
//! The upgrade strategy creates one adapter per physical socket and drives
//! it through [`SocketHandler`]. Only the adapter that wins the session's
//! single connection slot relays events; a concurrent second socket for the
//! same session id is answered with `c[2010,"Another connection still open"]`
//! and never reaches the user handler.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::frame::Frame;
use crate::domain::session::{Attributes, CloseStatus};
use crate::ports::{find_sub_protocols, Connection, SocketHandler, TransportError};

use super::session::{Admission, Session};

pub struct SocketSessionAdapter {
    session: Arc<Session>,
    connection_id: std::sync::OnceLock<String>,
    owns_session: AtomicBool,
}

impl SocketSessionAdapter {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            connection_id: std::sync::OnceLock::new(),
            owns_session: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn owns_session(&self) -> bool {
        self.owns_session.load(Ordering::Acquire)
    }

    fn release(&self) {
        if self.owns_session.swap(false, Ordering::AcqRel) {
            self.session.release_socket();
        }
    }
}

#[async_trait]
impl SocketHandler for SocketSessionAdapter {
    async fn on_open(&self, connection: Arc<dyn Connection>, attributes: Attributes) {
        let _ = self.connection_id.set(connection.id().to_string());

        if !self.session.try_claim_socket() {
            let status = CloseStatus::ANOTHER_CONNECTION_OPEN;
            debug!(
                session_id = %self.session.id(),
                connection_id = connection.id(),
                "Another connection still open"
            );
            if let Err(err) = connection.write_frame(&Frame::close_with(&status)).await {
                debug!(error = %err, "Failed to notify duplicate connection");
            }
            connection.close(&status).await;
            return;
        }
        self.owns_session.store(true, Ordering::Release);

        match self.session.connect(connection, attributes).await {
            Ok(Admission::Opened) | Ok(Admission::Resumed) => {}
            Ok(Admission::Rejected(_)) => self.release(),
            Err(err) => {
                warn!(session_id = %self.session.id(), error = %err, "Failed to open session");
                self.release();
            }
        }
    }

    async fn on_text(&self, text: String) {
        if self.owns_session() {
            self.session.handle_inbound_text(&text).await;
        }
    }

    async fn on_transport_error(&self, error: TransportError) {
        if self.owns_session() {
            self.session.handle_transport_error(error).await;
        }
    }

    async fn on_close(&self, status: CloseStatus) {
        if !self.owns_session() {
            return;
        }
        if let Some(connection_id) = self.connection_id.get() {
            self.session.connection_closed(connection_id, status).await;
        }
        self.release();
    }

    fn sub_protocols(&self) -> Vec<String> {
        find_sub_protocols(self.session.handler())
    }
}
