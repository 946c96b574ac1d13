//! HTTP exchange `Connection`.
//!
//! A sending request's response body is fed through an unbounded channel.
//! The exchange releases itself from the session once its budget is used:
//! after the first frame for polling, after the byte limit for streaming.

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use futures::channel::mpsc::{self, UnboundedSender};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use crate::domain::frame::{Frame, FrameFormat};
use crate::domain::session::CloseStatus;
use crate::ports::{Connection, Delivery, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMode {
    Polling,
    Streaming { bytes_limit: usize },
}

pub struct HttpExchange {
    id: String,
    format: FrameFormat,
    mode: ExchangeMode,
    body: UnboundedSender<Result<Bytes, io::Error>>,
    written: AtomicUsize,
    open: AtomicBool,
}

impl HttpExchange {
    /// Creates the exchange together with the response body it feeds.
    pub fn new(format: FrameFormat, mode: ExchangeMode) -> (Self, Body) {
        let (sender, receiver) = mpsc::unbounded();
        let exchange = Self {
            id: Uuid::new_v4().to_string(),
            format,
            mode,
            body: sender,
            written: AtomicUsize::new(0),
            open: AtomicBool::new(true),
        };
        (exchange, Body::from_stream(receiver))
    }

    /// Writes bytes that precede the first frame. Not counted against the
    /// streaming budget.
    pub fn write_prelude(&self, prelude: impl Into<Bytes>) -> Result<(), TransportError> {
        self.send(prelude.into())
    }

    /// Ends the response body.
    pub fn complete(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.body.close_channel();
        }
    }

    fn send(&self, chunk: Bytes) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.body.unbounded_send(Ok(chunk)).map_err(|_| {
            self.open.store(false, Ordering::Release);
            TransportError::ConnectionClosed
        })
    }
}

#[async_trait]
impl Connection for HttpExchange {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_frame(&self, frame: &Frame) -> Result<Delivery, TransportError> {
        let chunk = self.format.format(frame);
        let len = chunk.len();
        self.send(Bytes::from(chunk))?;

        let exhausted = match self.mode {
            ExchangeMode::Polling => true,
            ExchangeMode::Streaming { bytes_limit } => {
                let written = self.written.fetch_add(len, Ordering::AcqRel) + len;
                written >= bytes_limit
            }
        };
        if exhausted {
            self.complete();
            return Ok(Delivery::Released);
        }
        Ok(Delivery::Retained)
    }

    async fn close(&self, _status: &CloseStatus) {
        self.complete();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.body.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_text(body: Body) -> String {
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn polling_exchange_releases_after_first_frame() {
        let (exchange, body) = HttpExchange::new(FrameFormat::Newline, ExchangeMode::Polling);

        let delivery = exchange.write_frame(&Frame::open()).await.unwrap();

        assert_eq!(delivery, Delivery::Released);
        assert!(!exchange.is_open());
        assert_eq!(body_text(body).await, "o\n");
    }

    #[tokio::test]
    async fn streaming_exchange_releases_once_budget_is_spent() {
        let (exchange, body) = HttpExchange::new(
            FrameFormat::Newline,
            ExchangeMode::Streaming { bytes_limit: 6 },
        );
        exchange.write_prelude("prelude\n").unwrap();

        assert_eq!(
            exchange.write_frame(&Frame::open()).await,
            Ok(Delivery::Retained)
        );
        assert_eq!(
            exchange.write_frame(&Frame::messages(&["x"])).await,
            Ok(Delivery::Released)
        );
        assert_eq!(body_text(body).await, "prelude\no\na[\"x\"]\n");
    }

    #[tokio::test]
    async fn writes_after_completion_fail() {
        let (exchange, _body) = HttpExchange::new(FrameFormat::Newline, ExchangeMode::Polling);
        exchange.close(&CloseStatus::NORMAL).await;
        assert_eq!(
            exchange.write_frame(&Frame::heartbeat()).await,
            Err(TransportError::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn dropped_body_marks_exchange_closed() {
        let (exchange, body) = HttpExchange::new(FrameFormat::Newline, ExchangeMode::Polling);
        drop(body);
        assert!(!exchange.is_open());
    }
}
