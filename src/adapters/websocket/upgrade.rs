//! Axum upgrade strategy.
//!
//! Performs the RFC 6455 upgrade through axum's `WebSocketUpgrade` and runs
//! the socket loop that feeds a [`SocketHandler`]:
//! 1. Split the socket and spawn the writer task
//! 2. Announce the connection through `on_open`
//! 3. Relay text frames until the peer closes or the socket fails
//! 4. Report the close and let the writer drain

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use http::request::Parts;
use std::sync::Arc;

use crate::domain::session::{Attributes, CloseStatus, Principal};
use crate::ports::{
    Connection, Extension, HandshakeFailure, SocketHandler, TransportError, UpgradeStrategy,
};

use super::AxumSocketConnection;

#[derive(Debug, Clone, Copy, Default)]
pub struct AxumUpgradeStrategy;

impl AxumUpgradeStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UpgradeStrategy for AxumUpgradeStrategy {
    fn supported_versions(&self) -> Vec<String> {
        vec!["13".to_string()]
    }

    fn supported_extensions(&self, _request: &Parts) -> Vec<Extension> {
        Vec::new()
    }

    async fn upgrade(
        &self,
        request: &mut Parts,
        sub_protocol: Option<String>,
        _extensions: Vec<Extension>,
        principal: Option<Principal>,
        handler: Arc<dyn SocketHandler>,
        attributes: Attributes,
    ) -> Result<Response, HandshakeFailure> {
        let upgrade = WebSocketUpgrade::from_request_parts(request, &())
            .await
            .map_err(|rejection| HandshakeFailure::Upgrade(rejection.body_text()))?;

        let upgrade = match sub_protocol {
            Some(protocol) => upgrade.protocols([protocol]),
            None => upgrade,
        };

        tracing::debug!(
            uri = %request.uri,
            principal = principal.as_ref().map(Principal::name),
            "Upgrading to WebSocket"
        );

        Ok(upgrade
            .on_failed_upgrade(|error| {
                tracing::warn!("WebSocket upgrade failed: {}", error);
            })
            .on_upgrade(move |socket| run_socket(socket, handler, attributes))
            .into_response())
    }
}

/// Runs for the lifetime of one upgraded connection.
async fn run_socket(socket: WebSocket, handler: Arc<dyn SocketHandler>, attributes: Attributes) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut queue) = mpsc::unbounded::<Message>();
    let connection = Arc::new(AxumSocketConnection::new(outbound));
    let connection_id = connection.id().to_string();

    let send_task = {
        let connection_id = connection_id.clone();
        tokio::spawn(async move {
            while let Some(message) = queue.next().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(connection_id = %connection_id, "Send error: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        })
    };

    handler.on_open(connection.clone(), attributes).await;

    let status = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => handler.on_text(text).await,
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    "Received unsupported binary message"
                );
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                // Answered by axum
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                break frame
                    .map(|f| CloseStatus::new(f.code, f.reason.into_owned()))
                    .unwrap_or(CloseStatus::NO_STATUS);
            }
            Some(Err(e)) => {
                tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                handler
                    .on_transport_error(TransportError::Io(e.to_string()))
                    .await;
                break CloseStatus::NO_CLOSE_FRAME;
            }
            None => break CloseStatus::NO_CLOSE_FRAME,
        }
    };

    connection.shutdown();
    handler.on_close(status).await;
    let _ = send_task.await;
}
