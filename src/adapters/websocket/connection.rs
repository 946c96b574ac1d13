//! Native socket `Connection`.
//!
//! Writes go through an unbounded channel to a writer task that owns the
//! socket's sink half, so `write_frame` never waits on the network.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message};
use futures::channel::mpsc::UnboundedSender;
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::domain::frame::{Frame, FrameFormat};
use crate::domain::session::CloseStatus;
use crate::ports::{Connection, Delivery, TransportError};

pub struct AxumSocketConnection {
    id: String,
    outbound: UnboundedSender<Message>,
    open: AtomicBool,
}

impl AxumSocketConnection {
    pub fn new(outbound: UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            outbound,
            open: AtomicBool::new(true),
        }
    }

    /// Marks the socket gone and lets the writer task drain and stop.
    pub fn shutdown(&self) {
        self.open.store(false, Ordering::Release);
        self.outbound.close_channel();
    }
}

/// Close codes 1005, 1006 and the 1012-2999 range may not appear in a close
/// frame on the wire; those are sent as a normal closure.
pub(crate) fn wire_close_code(status: &CloseStatus) -> u16 {
    match status.code() {
        code @ (1000..=1003 | 1007..=1011 | 3000..=4999) => code,
        _ => CloseStatus::NORMAL.code(),
    }
}

#[async_trait]
impl Connection for AxumSocketConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_frame(&self, frame: &Frame) -> Result<Delivery, TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .unbounded_send(Message::Text(FrameFormat::Raw.format(frame)))
            .map_err(|_| TransportError::ConnectionClosed)?;
        Ok(Delivery::Retained)
    }

    async fn close(&self, status: &CloseStatus) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        let frame = CloseFrame {
            code: wire_close_code(status),
            reason: Cow::Owned(status.reason().to_string()),
        };
        let _ = self.outbound.unbounded_send(Message::Close(Some(frame)));
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }
}
