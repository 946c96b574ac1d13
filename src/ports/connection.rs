//! Connection port - the physical carrier currently attached to a session.
//!
//! A native socket keeps one connection for the whole session. The HTTP
//! transports attach a fresh connection for every request and release it
//! when the exchange completes, while the logical session lives on.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::frame::Frame;
use crate::domain::session::CloseStatus;

use super::CodecError;

/// What happened to the carrier after a frame was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The carrier stays attached and accepts more frames.
    Retained,
    /// The physical exchange is complete; the session must detach it.
    Released,
}

/// Errors raised while moving frames between a carrier and a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer is gone.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Reading or writing the carrier failed.
    #[error("I/O failure: {0}")]
    Io(String),

    /// Inbound content could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Too many outbound messages are waiting for a carrier.
    #[error("Message cache limit of {limit} exceeded")]
    CacheOverflow { limit: usize },

    /// The application handler failed.
    #[error("Message handler failed: {0}")]
    Handler(String),
}

/// A physical carrier frames can be written to.
///
/// Implementations apply their own [`FrameFormat`](crate::domain::frame::FrameFormat).
/// Callers serialize writes per session, so implementations never see
/// interleaved frames.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable id of this physical connection, for logging and detach checks.
    fn id(&self) -> &str;

    /// Writes one frame.
    async fn write_frame(&self, frame: &Frame) -> Result<Delivery, TransportError>;

    /// Ends the physical exchange.
    async fn close(&self, status: &CloseStatus);

    /// Returns false once the peer has gone or the exchange completed.
    fn is_open(&self) -> bool;
}
