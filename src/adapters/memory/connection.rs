//! In-memory `Connection` that records every frame written to it.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::domain::frame::Frame;
use crate::domain::session::CloseStatus;
use crate::ports::{Connection, Delivery, TransportError};

/// Connection double for session and adapter tests.
///
/// Features:
/// - Frame capture for assertions
/// - Polling-style release after the first frame
/// - Write failure injection
///
/// # Example
///
/// ```ignore
/// let conn = Arc::new(InMemoryConnection::new("c1"));
/// session.connect(conn.clone(), Attributes::new()).await?;
/// assert_eq!(conn.contents(), vec!["o"]);
/// ```
pub struct InMemoryConnection {
    id: String,
    release_after_write: bool,
    frames: RwLock<Vec<Frame>>,
    open: AtomicBool,
    fail_writes: AtomicBool,
    close_status: RwLock<Option<CloseStatus>>,
}

impl InMemoryConnection {
    /// A connection that keeps itself attached, like a native socket.
    pub fn new(id: impl Into<String>) -> Self {
        Self::build(id.into(), false)
    }

    /// A connection released after every frame, like a polling request.
    pub fn releasing(id: impl Into<String>) -> Self {
        Self::build(id.into(), true)
    }

    fn build(id: String, release_after_write: bool) -> Self {
        Self {
            id,
            release_after_write,
            frames: RwLock::new(Vec::new()),
            open: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            close_status: RwLock::new(None),
        }
    }

    // === Test Helpers ===

    /// Makes every following write fail with `ConnectionClosed`.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Returns all written frames.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames
            .read()
            .expect("InMemoryConnection: frames lock poisoned")
            .clone()
    }

    /// Returns the wire content of all written frames.
    pub fn contents(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .map(Frame::into_content)
            .collect()
    }

    /// Returns the status the connection was closed with, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn close_status(&self) -> Option<CloseStatus> {
        self.close_status
            .read()
            .expect("InMemoryConnection: close lock poisoned")
            .clone()
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_frame(&self, frame: &Frame) -> Result<Delivery, TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) || !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        self.frames
            .write()
            .expect("InMemoryConnection: frames lock poisoned")
            .push(frame.clone());
        Ok(if self.release_after_write {
            Delivery::Released
        } else {
            Delivery::Retained
        })
    }

    async fn close(&self, status: &CloseStatus) {
        if self.open.swap(false, Ordering::SeqCst) {
            *self
                .close_status
                .write()
                .expect("InMemoryConnection: close lock poisoned") = Some(status.clone());
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_frames_until_closed() {
        let conn = InMemoryConnection::new("c1");
        conn.write_frame(&Frame::open()).await.unwrap();
        conn.close(&CloseStatus::NORMAL).await;

        assert_eq!(conn.contents(), vec!["o"]);
        assert_eq!(conn.close_status(), Some(CloseStatus::NORMAL));
        assert_eq!(
            conn.write_frame(&Frame::heartbeat()).await,
            Err(TransportError::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn releasing_connection_reports_release() {
        let conn = InMemoryConnection::releasing("p1");
        assert_eq!(
            conn.write_frame(&Frame::open()).await,
            Ok(Delivery::Released)
        );
    }
}
