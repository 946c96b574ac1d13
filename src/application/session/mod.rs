//! Session - the carrier-independent logical connection.
//!
//! A [`Session`] outlives the physical exchanges that carry it. The native
//! socket path attaches one connection for the session's whole life; the
//! HTTP paths attach a new exchange per polling or streaming request and
//! detach it again once the exchange is released.
//!
//! # State machine
//!
//! ```text
//! CONNECTING ──connect──▶ OPEN ──close / transport error──▶ CLOSED
//!      └──────────────────close (never opened)──────────────────┘
//! ```
//!
//! Every frame goes out through a single per-session lock, so concurrent
//! producers (user code, the heartbeat driver, the close path) never
//! interleave writes.

mod heartbeat;
mod registry;

pub use registry::SessionRegistry;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::config::TransportConfig;
use crate::domain::foundation::StateMachine;
use crate::domain::frame::Frame;
use crate::domain::session::{Attributes, CloseStatus, Principal, SessionId, SessionState};
use crate::domain::transport::TransportType;
use crate::ports::{
    Connection, Delivery, MessageCodec, MessageHandler, SessionHandle, TransportError,
};

/// Collaborators shared by every session of one endpoint.
#[derive(Clone)]
pub struct SessionContext {
    pub handler: Arc<dyn MessageHandler>,
    pub codec: Arc<dyn MessageCodec>,
    pub config: Arc<TransportConfig>,
}

impl SessionContext {
    pub fn new(
        handler: Arc<dyn MessageHandler>,
        codec: Arc<dyn MessageCodec>,
        config: Arc<TransportConfig>,
    ) -> Self {
        Self {
            handler,
            codec,
            config,
        }
    }
}

/// Result of offering a physical connection to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The session moved to OPEN on this connection.
    Opened,
    /// An open session took the connection as its new carrier.
    Resumed,
    /// The connection was answered with a close frame and not attached.
    Rejected(CloseStatus),
}

/// Outcome of one heartbeat driver wake-up.
pub(crate) enum Tick {
    Wait(Instant),
    Stop,
    Failed(TransportError),
}

struct Inner {
    state: SessionState,
    connection: Option<Arc<dyn Connection>>,
    cache: VecDeque<String>,
    heartbeat_deadline: Instant,
    heartbeat_task: Option<JoinHandle<()>>,
    attributes: Attributes,
    last_active: Instant,
}

pub struct Session {
    id: SessionId,
    transport: TransportType,
    principal: Option<Principal>,
    handler: Arc<dyn MessageHandler>,
    codec: Arc<dyn MessageCodec>,
    config: Arc<TransportConfig>,
    inner: Mutex<Inner>,
    socket_connections: AtomicUsize,
    me: Weak<Session>,
}

impl Session {
    pub fn new(
        id: SessionId,
        transport: TransportType,
        principal: Option<Principal>,
        context: &SessionContext,
    ) -> Arc<Self> {
        let now = Instant::now();
        Arc::new_cyclic(|me| Session {
            id,
            transport,
            principal,
            handler: context.handler.clone(),
            codec: context.codec.clone(),
            config: context.config.clone(),
            inner: Mutex::new(Inner {
                state: SessionState::Connecting,
                connection: None,
                cache: VecDeque::new(),
                heartbeat_deadline: now,
                heartbeat_task: None,
                attributes: Attributes::new(),
                last_active: now,
            }),
            socket_connections: AtomicUsize::new(0),
            me: me.clone(),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transport(&self) -> TransportType {
        self.transport
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn codec(&self) -> &Arc<dyn MessageCodec> {
        &self.codec
    }

    pub fn handler(&self) -> &dyn MessageHandler {
        self.handler.as_ref()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn attributes(&self) -> Attributes {
        self.inner.lock().await.attributes.clone()
    }

    /// Whether a physical connection is currently attached.
    pub async fn is_attached(&self) -> bool {
        self.inner.lock().await.connection.is_some()
    }

    fn handle(&self) -> Option<Arc<dyn SessionHandle>> {
        self.me.upgrade().map(|s| s as Arc<dyn SessionHandle>)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Connection lifecycle
    // ════════════════════════════════════════════════════════════════════════

    /// Offers a physical connection to the session.
    ///
    /// A CONNECTING session opens on it, an OPEN session without a carrier
    /// resumes on it. A CLOSED session answers with `c[3000,"Go away!"]` and
    /// a session that already has a live carrier answers with
    /// `c[2010,"Another connection still open"]`; in both cases the session
    /// itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the write failure after the session has been closed because of it.
    pub async fn connect(
        &self,
        connection: Arc<dyn Connection>,
        attributes: Attributes,
    ) -> Result<Admission, TransportError> {
        let mut inner = self.inner.lock().await;

        let rejection = match inner.state {
            SessionState::Closed => Some(CloseStatus::GO_AWAY),
            SessionState::Open if inner.connection.as_ref().is_some_and(|c| c.is_open()) => {
                Some(CloseStatus::ANOTHER_CONNECTION_OPEN)
            }
            _ => None,
        };
        if let Some(status) = rejection {
            drop(inner);
            debug!(
                session_id = %self.id,
                connection_id = connection.id(),
                code = status.code(),
                "Rejecting connection"
            );
            let _ = connection.write_frame(&Frame::close_with(&status)).await;
            connection.close(&status).await;
            return Ok(Admission::Rejected(status));
        }

        inner.connection = Some(connection);
        inner.last_active = Instant::now();

        if inner.state.is_open() {
            let result = if inner.cache.is_empty() {
                inner.heartbeat_deadline = Instant::now() + self.config.heartbeat_interval();
                Ok(())
            } else {
                self.flush_locked(&mut inner).await
            };
            drop(inner);
            return match result {
                Ok(()) => Ok(Admission::Resumed),
                Err(err) => {
                    self.handle_transport_error(err.clone()).await;
                    Err(err)
                }
            };
        }

        let opened = self.open_locked(&mut inner, attributes).await;
        drop(inner);
        if let Err(err) = opened {
            self.handle_transport_error(err.clone()).await;
            return Err(err);
        }

        debug!(session_id = %self.id, transport = %self.transport, "Session opened");

        if let Some(handle) = self.handle() {
            if let Err(err) = self.handler.after_connection_established(handle).await {
                warn!(session_id = %self.id, error = %err, "Handler rejected new session");
                self.handle_transport_error(TransportError::Handler(err.to_string()))
                    .await;
            }
        }
        Ok(Admission::Opened)
    }

    async fn open_locked(
        &self,
        inner: &mut Inner,
        attributes: Attributes,
    ) -> Result<(), TransportError> {
        self.write_locked(inner, &Frame::open()).await?;
        if !inner.cache.is_empty() && inner.connection.is_some() {
            self.flush_locked(inner).await?;
        }

        inner.state = self.advance(inner.state, SessionState::Open);
        inner.attributes.extend(attributes);
        inner.heartbeat_task = Some(heartbeat::spawn(
            self.me.clone(),
            inner.heartbeat_deadline,
        ));
        Ok(())
    }

    /// Detaches `connection_id` without closing the session.
    ///
    /// Used when an HTTP exchange ends while the logical session lives on.
    pub async fn detach(&self, connection_id: &str) {
        let mut inner = self.inner.lock().await;
        if inner
            .connection
            .as_ref()
            .is_some_and(|c| c.id() == connection_id)
        {
            trace!(session_id = %self.id, connection_id, "Connection detached");
            inner.connection = None;
            inner.last_active = Instant::now();
        }
    }

    /// The carrier `connection_id` went away; closes the session if it was
    /// the active one. No close frame is written.
    pub async fn connection_closed(&self, connection_id: &str, status: CloseStatus) {
        {
            let mut inner = self.inner.lock().await;
            match inner.connection.as_ref() {
                Some(c) if c.id() == connection_id => inner.connection = None,
                _ => return,
            }
        }
        self.close_internal(status, None, false).await;
    }

    // ════════════════════════════════════════════════════════════════════════
    // Outbound
    // ════════════════════════════════════════════════════════════════════════

    /// Queues a message and flushes the queue when a carrier is attached.
    ///
    /// A CLOSED session ignores the message.
    ///
    /// # Errors
    ///
    /// - `CacheOverflow` when the queue is already at its configured size
    /// - the write failure, after the session has been closed because of it
    pub async fn send_message(&self, message: String) -> Result<(), TransportError> {
        let result = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_closed() {
                trace!(session_id = %self.id, "Dropping message for closed session");
                return Ok(());
            }
            let limit = self.config.http_message_cache_size;
            if inner.cache.len() >= limit {
                return Err(TransportError::CacheOverflow { limit });
            }
            inner.cache.push_back(message);
            if inner.state.is_open() && inner.connection.is_some() {
                self.flush_locked(&mut inner).await
            } else {
                Ok(())
            }
        };

        if let Err(err) = &result {
            self.handle_transport_error(err.clone()).await;
        }
        result
    }

    async fn flush_locked(&self, inner: &mut Inner) -> Result<(), TransportError> {
        let messages: Vec<String> = inner.cache.drain(..).collect();
        let frame = self.codec.encode_frame(&messages)?;
        self.write_locked(inner, &frame).await
    }

    async fn write_locked(&self, inner: &mut Inner, frame: &Frame) -> Result<(), TransportError> {
        let Some(connection) = inner.connection.clone() else {
            return Ok(());
        };
        trace!(session_id = %self.id, frame = %frame, "Writing frame");

        match connection.write_frame(frame).await {
            Ok(delivery) => {
                let now = Instant::now();
                inner.heartbeat_deadline = now + self.config.heartbeat_interval();
                if delivery == Delivery::Released {
                    inner.connection = None;
                    inner.last_active = now;
                }
                Ok(())
            }
            Err(err) => {
                inner.connection = None;
                Err(err)
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Inbound
    // ════════════════════════════════════════════════════════════════════════

    /// Delivers decoded messages to the user handler in order.
    ///
    /// Nothing is delivered unless the session is OPEN. A handler failure
    /// closes the session and drops the remaining messages.
    pub async fn handle_inbound(&self, messages: Vec<String>) {
        let Some(handle) = self.handle() else {
            return;
        };
        {
            let mut inner = self.inner.lock().await;
            inner.last_active = Instant::now();
        }

        for message in messages {
            if !self.state().await.is_open() {
                trace!(session_id = %self.id, "Ignoring inbound message for inactive session");
                return;
            }
            if let Err(err) = self.handler.handle_message(handle.clone(), message).await {
                warn!(session_id = %self.id, error = %err, "Message handler failed");
                self.handle_transport_error(TransportError::Handler(err.to_string()))
                    .await;
                return;
            }
        }
    }

    /// Decodes one text payload of the native socket and delivers it.
    ///
    /// Empty payloads are ignored; undecodable ones close the session.
    pub async fn handle_inbound_text(&self, payload: &str) {
        if payload.is_empty() || !self.state().await.is_open() {
            return;
        }
        match self.codec.decode(payload) {
            Ok(messages) => self.handle_inbound(messages).await,
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "Failed to decode inbound payload");
                self.handle_transport_error(err.into()).await;
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Closing
    // ════════════════════════════════════════════════════════════════════════

    /// Closes the session, writing a close frame on the active carrier.
    pub async fn close(&self, status: CloseStatus) {
        self.close_internal(status, None, true).await;
    }

    /// Reports a transport failure to the handler and closes the session.
    pub async fn handle_transport_error(&self, error: TransportError) {
        let status = match &error {
            TransportError::Codec(_) => CloseStatus::BAD_DATA,
            _ => CloseStatus::SERVER_ERROR,
        };
        self.close_internal(status, Some(error), true).await;
    }

    async fn close_internal(
        &self,
        status: CloseStatus,
        error: Option<TransportError>,
        write_frame: bool,
    ) {
        let was_open = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_closed() {
                return;
            }
            let was_open = inner.state.is_open();
            inner.state = self.advance(inner.state, SessionState::Closed);

            if let Some(task) = inner.heartbeat_task.take() {
                task.abort();
            }
            inner.cache.clear();

            if let Some(connection) = inner.connection.take() {
                if write_frame {
                    if let Err(err) = connection.write_frame(&Frame::close_with(&status)).await {
                        debug!(session_id = %self.id, error = %err, "Close frame not delivered");
                    }
                }
                connection.close(&status).await;
            }
            was_open
        };

        debug!(session_id = %self.id, code = status.code(), "Session closed");

        if was_open {
            if let Some(handle) = self.handle() {
                if let Some(error) = error {
                    self.handler
                        .handle_transport_error(handle.clone(), &error)
                        .await;
                }
                self.handler.after_connection_closed(handle, &status).await;
            }
        }

        // Handlers may still read the attributes while being told of the close.
        self.inner.lock().await.attributes.clear();
    }

    fn advance(&self, from: SessionState, to: SessionState) -> SessionState {
        match from.transition_to(to) {
            Ok(next) => next,
            Err(err) => {
                warn!(session_id = %self.id, error = %err, "Ignoring invalid transition");
                from
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Heartbeat and expiry
    // ════════════════════════════════════════════════════════════════════════

    pub(crate) async fn heartbeat_tick(&self) -> Tick {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_open() {
            return Tick::Stop;
        }
        let now = Instant::now();
        if now < inner.heartbeat_deadline {
            return Tick::Wait(inner.heartbeat_deadline);
        }
        if inner.connection.is_none() {
            inner.heartbeat_deadline = now + self.config.heartbeat_interval();
            return Tick::Wait(inner.heartbeat_deadline);
        }
        match self.write_locked(&mut inner, &Frame::heartbeat()).await {
            Ok(()) => Tick::Wait(inner.heartbeat_deadline),
            Err(err) => Tick::Failed(err),
        }
    }

    /// Whether the session has had no carrier for longer than `delay`.
    pub async fn is_expired(&self, delay: Duration) -> bool {
        let inner = self.inner.lock().await;
        inner.connection.is_none() && inner.last_active.elapsed() > delay
    }

    // ════════════════════════════════════════════════════════════════════════
    // Native connection guard
    // ════════════════════════════════════════════════════════════════════════

    /// Claims the single native-socket slot of this session.
    pub(crate) fn try_claim_socket(&self) -> bool {
        self.socket_connections
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_socket(&self) {
        let _ = self
            .socket_connections
            .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionHandle for Session {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn transport(&self) -> TransportType {
        self.transport
    }

    fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    async fn state(&self) -> SessionState {
        Session::state(self).await
    }

    async fn attributes(&self) -> Attributes {
        Session::attributes(self).await
    }

    async fn send_message(&self, message: String) -> Result<(), TransportError> {
        Session::send_message(self, message).await
    }

    async fn close(&self, status: CloseStatus) {
        Session::close(self, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::codec::JsonMessageCodec;
    use crate::adapters::memory::{HandlerEvent, InMemoryConnection, RecordingMessageHandler};
    use crate::ports::HandlerError;

    fn context(handler: Arc<RecordingMessageHandler>) -> SessionContext {
        SessionContext::new(
            handler,
            Arc::new(JsonMessageCodec),
            Arc::new(TransportConfig::default()),
        )
    }

    fn session(handler: Arc<RecordingMessageHandler>) -> Arc<Session> {
        Session::new(
            SessionId::parse("s1").unwrap(),
            TransportType::WebSocket,
            None,
            &context(handler),
        )
    }

    #[tokio::test]
    async fn connect_writes_open_frame_and_notifies_handler() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler.clone());
        let conn = Arc::new(InMemoryConnection::new("c1"));

        let mut attributes = Attributes::new();
        attributes.insert("user".into(), serde_json::json!("ada"));
        let admission = session.connect(conn.clone(), attributes).await.unwrap();

        assert_eq!(admission, Admission::Opened);
        assert_eq!(conn.contents(), vec!["o"]);
        assert_eq!(session.state().await, SessionState::Open);
        assert_eq!(session.attributes().await["user"], "ada");
        assert_eq!(handler.events(), vec![HandlerEvent::Established]);
    }

    /// Captures the attributes visible while the close is reported.
    #[derive(Default)]
    struct AttributesAtClose(std::sync::Mutex<Option<Attributes>>);

    #[async_trait]
    impl MessageHandler for AttributesAtClose {
        async fn after_connection_established(
            &self,
            _session: Arc<dyn SessionHandle>,
        ) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn handle_message(
            &self,
            _session: Arc<dyn SessionHandle>,
            _message: String,
        ) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn handle_transport_error(
            &self,
            _session: Arc<dyn SessionHandle>,
            _error: &TransportError,
        ) {
        }

        async fn after_connection_closed(
            &self,
            session: Arc<dyn SessionHandle>,
            _status: &CloseStatus,
        ) {
            let attributes = session.attributes().await;
            *self.0.lock().unwrap() = Some(attributes);
        }
    }

    #[tokio::test]
    async fn attributes_are_released_after_close_is_reported() {
        let handler = Arc::new(AttributesAtClose::default());
        let context = SessionContext::new(
            handler.clone(),
            Arc::new(JsonMessageCodec),
            Arc::new(TransportConfig::default()),
        );
        let session = Session::new(
            SessionId::parse("s1").unwrap(),
            TransportType::XhrPolling,
            None,
            &context,
        );
        let mut attributes = Attributes::new();
        attributes.insert("user".into(), serde_json::json!("ada"));
        session
            .connect(Arc::new(InMemoryConnection::new("c1")), attributes)
            .await
            .unwrap();

        session.close(CloseStatus::NORMAL).await;

        let seen = handler.0.lock().unwrap().clone().unwrap();
        assert_eq!(seen["user"], "ada");
        assert!(session.attributes().await.is_empty());
    }

    #[tokio::test]
    async fn messages_are_flushed_as_one_array_frame() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler);
        session.send_message("early".into()).await.unwrap();

        let conn = Arc::new(InMemoryConnection::new("c1"));
        session.connect(conn.clone(), Attributes::new()).await.unwrap();
        session.send_message("later".into()).await.unwrap();

        assert_eq!(conn.contents(), vec!["o", "a[\"early\"]", "a[\"later\"]"]);
    }

    #[tokio::test]
    async fn second_connection_is_rejected_with_2010() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler.clone());
        let first = Arc::new(InMemoryConnection::new("c1"));
        let second = Arc::new(InMemoryConnection::new("c2"));
        session.connect(first.clone(), Attributes::new()).await.unwrap();

        let admission = session.connect(second.clone(), Attributes::new()).await.unwrap();

        assert_eq!(
            admission,
            Admission::Rejected(CloseStatus::ANOTHER_CONNECTION_OPEN)
        );
        assert_eq!(
            second.contents(),
            vec!["c[2010,\"Another connection still open\"]"]
        );
        assert!(!second.is_open());
        assert!(first.is_open());
        assert_eq!(first.contents(), vec!["o"]);
        assert_eq!(handler.events(), vec![HandlerEvent::Established]);
    }

    #[tokio::test]
    async fn closed_session_answers_go_away() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler);
        session.close(CloseStatus::NORMAL).await;

        let conn = Arc::new(InMemoryConnection::new("c1"));
        let admission = session.connect(conn.clone(), Attributes::new()).await.unwrap();

        assert_eq!(admission, Admission::Rejected(CloseStatus::GO_AWAY));
        assert_eq!(conn.contents(), vec!["c[3000,\"Go away!\"]"]);
    }

    #[tokio::test]
    async fn close_is_forwarded_exactly_once_and_later_dispatch_is_a_no_op() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler.clone());
        let conn = Arc::new(InMemoryConnection::new("c1"));
        session.connect(conn.clone(), Attributes::new()).await.unwrap();

        session.close(CloseStatus::NORMAL).await;
        session.close(CloseStatus::GOING_AWAY).await;
        session
            .handle_transport_error(TransportError::ConnectionClosed)
            .await;
        session.send_message("ignored".into()).await.unwrap();
        session.handle_inbound(vec!["ignored".into()]).await;

        assert_eq!(session.state().await, SessionState::Closed);
        assert_eq!(conn.contents(), vec!["o", "c[1000,\"\"]"]);
        assert_eq!(
            handler.events(),
            vec![
                HandlerEvent::Established,
                HandlerEvent::Closed(CloseStatus::NORMAL)
            ]
        );
    }

    #[tokio::test]
    async fn inbound_messages_reach_handler_decoded() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler.clone());
        session
            .connect(Arc::new(InMemoryConnection::new("c1")), Attributes::new())
            .await
            .unwrap();

        session.handle_inbound_text("[\"a\",\"b\"]").await;

        assert_eq!(
            handler.events(),
            vec![
                HandlerEvent::Established,
                HandlerEvent::Message("a".into()),
                HandlerEvent::Message("b".into())
            ]
        );
    }

    #[tokio::test]
    async fn undecodable_native_payload_closes_with_bad_data() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler.clone());
        let conn = Arc::new(InMemoryConnection::new("c1"));
        session.connect(conn.clone(), Attributes::new()).await.unwrap();

        session.handle_inbound_text("not json").await;

        assert_eq!(session.state().await, SessionState::Closed);
        let events = handler.events();
        assert!(matches!(events[1], HandlerEvent::TransportError(_)));
        assert_eq!(events[2], HandlerEvent::Closed(CloseStatus::BAD_DATA));
    }

    #[tokio::test]
    async fn write_failure_closes_session_through_transport_error() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler.clone());
        let conn = Arc::new(InMemoryConnection::new("c1"));
        session.connect(conn.clone(), Attributes::new()).await.unwrap();
        conn.fail_writes();

        let result = session.send_message("x".into()).await;

        assert_eq!(result, Err(TransportError::ConnectionClosed));
        assert_eq!(session.state().await, SessionState::Closed);
        assert_eq!(
            handler.events(),
            vec![
                HandlerEvent::Established,
                HandlerEvent::TransportError(TransportError::ConnectionClosed),
                HandlerEvent::Closed(CloseStatus::SERVER_ERROR)
            ]
        );
    }

    #[tokio::test]
    async fn released_connection_is_detached_and_messages_are_cached() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler);
        let poll = Arc::new(InMemoryConnection::releasing("p1"));
        session.connect(poll.clone(), Attributes::new()).await.unwrap();
        assert!(!session.is_attached().await);

        session.send_message("one".into()).await.unwrap();
        session.send_message("two".into()).await.unwrap();
        let next = Arc::new(InMemoryConnection::releasing("p2"));
        let admission = session.connect(next.clone(), Attributes::new()).await.unwrap();

        assert_eq!(admission, Admission::Resumed);
        assert_eq!(poll.contents(), vec!["o"]);
        assert_eq!(next.contents(), vec!["a[\"one\",\"two\"]"]);
    }

    #[tokio::test]
    async fn cache_overflow_is_reported_without_closing() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let config = TransportConfig {
            http_message_cache_size: 1,
            ..Default::default()
        };
        let context = SessionContext::new(
            handler,
            Arc::new(JsonMessageCodec),
            Arc::new(config),
        );
        let session = Session::new(
            SessionId::parse("s1").unwrap(),
            TransportType::XhrPolling,
            None,
            &context,
        );

        session.send_message("one".into()).await.unwrap();
        let result = session.send_message("two".into()).await;

        assert_eq!(result, Err(TransportError::CacheOverflow { limit: 1 }));
        assert_eq!(session.state().await, SessionState::Connecting);
    }

    #[tokio::test]
    async fn handler_failure_on_establish_closes_with_server_error() {
        let handler = Arc::new(RecordingMessageHandler::failing_on_establish());
        let session = session(handler.clone());
        let conn = Arc::new(InMemoryConnection::new("c1"));

        let admission = session.connect(conn.clone(), Attributes::new()).await.unwrap();

        assert_eq!(admission, Admission::Opened);
        assert_eq!(session.state().await, SessionState::Closed);
        assert_eq!(conn.contents(), vec!["o", "c[1011,\"\"]"]);
        assert_eq!(
            handler.events().last(),
            Some(&HandlerEvent::Closed(CloseStatus::SERVER_ERROR))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_emits_exactly_one_heartbeat_per_interval() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler.clone());
        let conn = Arc::new(InMemoryConnection::new("c1"));
        session.connect(conn.clone(), Attributes::new()).await.unwrap();

        let interval = TransportConfig::default().heartbeat_interval();
        tokio::time::advance(interval - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(conn.contents(), vec!["o"]);

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(conn.contents(), vec!["o", "h"]);

        session.handle_inbound_text("[\"ping\"]").await;
        assert_eq!(
            handler.events(),
            vec![HandlerEvent::Established, HandlerEvent::Message("ping".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sent_messages_postpone_the_heartbeat() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler);
        let conn = Arc::new(InMemoryConnection::new("c1"));
        session.connect(conn.clone(), Attributes::new()).await.unwrap();

        let interval = TransportConfig::default().heartbeat_interval();
        tokio::time::advance(interval / 2).await;
        session.send_message("x".into()).await.unwrap();
        tokio::time::advance(interval / 2 + Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(conn.contents(), vec!["o", "a[\"x\"]"]);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_stops_the_heartbeat() {
        let handler = Arc::new(RecordingMessageHandler::new());
        let session = session(handler);
        let conn = Arc::new(InMemoryConnection::new("c1"));
        session.connect(conn.clone(), Attributes::new()).await.unwrap();
        session.close(CloseStatus::NORMAL).await;

        tokio::time::advance(TransportConfig::default().heartbeat_interval() * 3).await;
        settle().await;

        assert_eq!(conn.contents(), vec!["o", "c[1000,\"\"]"]);
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}
