//! SocketHandler port - callbacks of one raw full-duplex connection.
//!
//! Upgrade strategies drive these callbacks from the host runtime's socket
//! events. One handler instance serves exactly one physical connection.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::session::{Attributes, CloseStatus};

use super::{Connection, TransportError};

#[async_trait]
pub trait SocketHandler: Send + Sync {
    /// The connection is upgraded. `attributes` come from the handshake.
    async fn on_open(&self, connection: Arc<dyn Connection>, attributes: Attributes);

    /// A text message arrived.
    async fn on_text(&self, text: String);

    /// Reading the connection failed.
    async fn on_transport_error(&self, error: TransportError);

    /// The connection is gone. Called once, after every other callback.
    async fn on_close(&self, status: CloseStatus);

    /// Sub-protocols offered during negotiation.
    fn sub_protocols(&self) -> Vec<String> {
        Vec::new()
    }
}
