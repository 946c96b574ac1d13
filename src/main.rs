//! Echo service demonstrating the transport layer.
//!
//! Every message a client sends is sent straight back on the same session.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sockjs_transport::adapters::TransportService;
use sockjs_transport::application::{ErrorTrappingMessageHandler, LoggingMessageHandler};
use sockjs_transport::config::{AppConfig, ServerConfig};
use sockjs_transport::domain::session::CloseStatus;
use sockjs_transport::ports::{HandlerError, MessageHandler, SessionHandle, TransportError};

struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn after_connection_established(
        &self,
        _session: Arc<dyn SessionHandle>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_message(
        &self,
        session: Arc<dyn SessionHandle>,
        message: String,
    ) -> Result<(), HandlerError> {
        session.send_message(message).await?;
        Ok(())
    }

    async fn handle_transport_error(&self, _session: Arc<dyn SessionHandle>, _error: &TransportError) {
    }

    async fn after_connection_closed(&self, _session: Arc<dyn SessionHandle>, _status: &CloseStatus) {
    }
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if server.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.server);

    let handler = ErrorTrappingMessageHandler::new(LoggingMessageHandler::new(EchoHandler));
    let service = TransportService::builder(Arc::new(handler))
        .config(config.transport.clone())
        .prefix(config.server.prefix.clone())
        .cors_origins(config.server.cors_origins_list())
        .build();
    let _sweeper = service.spawn_sweeper();

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, prefix = %config.server.normalized_prefix(), "Listening");

    axum::serve(listener, service.router()).await?;
    Ok(())
}
