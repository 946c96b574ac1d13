//! TransportService - the HTTP surface of the transport layer.
//!
//! ```text
//! GET      {prefix}                               greeting
//! GET      {prefix}/info                          server capabilities
//! OPTIONS  {prefix}/info                          preflight
//! *        {prefix}/{server}/{session}/{transport} transport dispatch
//! ```
//!
//! `CorsLayer` decorates the actual requests only. Preflights are answered by
//! the routes themselves with `204` and a one year cache, so transports that
//! do not accept cross-origin calls still answer `404`.

use axum::extract::{Path, Request, State};
use axum::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, CACHE_CONTROL, CONTENT_TYPE, COOKIE, ORIGIN, SET_COOKIE, VARY,
};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use http::request::Parts;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

use crate::adapters::codec::JsonMessageCodec;
use crate::adapters::interceptors::OriginInterceptor;
use crate::adapters::websocket::AxumUpgradeStrategy;
use crate::application::{
    HandshakeHandler, HandshakeOutcome, InterceptorChain, Session, SessionContext,
    SessionRegistry, SocketSessionAdapter,
};
use crate::config::TransportConfig;
use crate::domain::session::{Attributes, SessionId, SessionState};
use crate::domain::transport::{TransportRole, TransportType};
use crate::ports::{
    HandshakeContext, HandshakeInterceptor, MessageCodec, MessageHandler, UpgradeStrategy,
};

use super::{
    HttpTransportError, ReceivingTransportHandler, SendingTransportHandler, TransportHandler,
};

pub const GREETING: &str = "Welcome to SockJS!\n";

const ONE_YEAR: Duration = Duration::from_secs(31_536_000);
const MAX_BODY_BYTES: usize = 1024 * 1024;
const NO_CACHE: &str = "no-store, no-cache, no-transform, must-revalidate, max-age=0";
const CACHE_ONE_YEAR: &str = "public, max-age=31536000";
const ONE_YEAR_SECS: &str = "31536000";

// ════════════════════════════════════════════════════════════════════════════
// Service
// ════════════════════════════════════════════════════════════════════════════

pub struct TransportService {
    prefix: String,
    config: Arc<TransportConfig>,
    context: SessionContext,
    registry: Arc<SessionRegistry>,
    handlers: HashMap<TransportType, Arc<dyn TransportHandler>>,
    handshake: HandshakeHandler,
    interceptors: Vec<Arc<dyn HandshakeInterceptor>>,
    cors_origins: Vec<String>,
}

impl TransportService {
    pub fn builder(handler: Arc<dyn MessageHandler>) -> TransportServiceBuilder {
        TransportServiceBuilder::new(handler)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Starts the background sweep of expired sessions.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.registry
            .spawn_sweeper(self.config.sweep_interval(), self.config.disconnect_delay())
    }

    /// Builds the axum router mounted at the configured prefix.
    pub fn router(self: &Arc<Self>) -> Router {
        let prefix = self.prefix.trim_end_matches('/');

        let mut router = Router::new();
        if prefix.is_empty() {
            router = router.route("/", get(greeting));
        } else {
            router = router
                .route(prefix, get(greeting))
                .route(&format!("{prefix}/"), get(greeting));
        }

        // Method routers only wrap the endpoints registered before `layer`, so
        // OPTIONS stays outside the CORS layer.
        router
            .route(
                &format!("{prefix}/info"),
                get(info).layer(self.cors_layer()).options(info_options),
            )
            .route(
                &format!("{prefix}/:server/:session/:transport"),
                get(dispatch)
                    .post(dispatch)
                    .fallback(dispatch)
                    .layer(self.cors_layer())
                    .options(dispatch),
            )
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    fn origin_allowed(&self, origin: &HeaderValue) -> bool {
        self.cors_origins.is_empty()
            || self
                .cors_origins
                .iter()
                .any(|allowed| allowed.as_bytes() == origin.as_bytes())
    }

    /// Answers a preflight with the methods a resource accepts.
    fn preflight_response(&self, request: &HeaderMap, methods: &'static str) -> Response {
        let mut response = (
            StatusCode::NO_CONTENT,
            [
                (ACCESS_CONTROL_ALLOW_METHODS, methods),
                (CACHE_CONTROL, CACHE_ONE_YEAR),
                (ACCESS_CONTROL_MAX_AGE, ONE_YEAR_SECS),
                (VARY, "origin"),
            ],
        )
            .into_response();

        let headers = response.headers_mut();
        if let Some(origin) = request.get(ORIGIN).filter(|o| self.origin_allowed(o)) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(requested) = request.get(ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        response
    }

    fn cors_layer(&self) -> CorsLayer {
        let origin = if self.cors_origins.is_empty() {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::list(
                self.cors_origins
                    .iter()
                    .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
            )
        };
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(AllowHeaders::mirror_request())
            .max_age(ONE_YEAR)
    }

    /// Serves `{server}/{session}/{transport}`.
    ///
    /// # Errors
    ///
    /// - `NotFound` for malformed segments, unknown transports, wrong
    ///   methods, unknown sessions on receiving transports, or a disabled
    ///   native transport
    /// - the transport handler's own failures
    pub async fn handle_transport_request(
        &self,
        server: &str,
        session_id: &str,
        transport: &str,
        request: Request,
    ) -> Result<Response, HttpTransportError> {
        if server.is_empty() || server.contains('.') {
            return Err(HttpTransportError::NotFound);
        }
        let session_id = SessionId::parse(session_id).map_err(|_| HttpTransportError::NotFound)?;
        let transport = TransportType::from_token(transport).ok_or(HttpTransportError::NotFound)?;
        let (parts, body) = request.into_parts();

        if parts.method == Method::OPTIONS && transport.supports_cors() {
            return Ok(self.preflight_response(&parts.headers, "OPTIONS, POST"));
        }
        if parts.method != transport.http_method() {
            debug!(method = %parts.method, transport = %transport, "Method not supported");
            return Err(HttpTransportError::NotFound);
        }

        let mut response = match transport.role() {
            TransportRole::Native => self.handle_websocket(parts, session_id).await?,
            TransportRole::Receiving => {
                let session = self
                    .registry
                    .get(&session_id)
                    .await
                    .ok_or(HttpTransportError::NotFound)?;
                let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
                    .await
                    .map_err(|e| HttpTransportError::BodyRead(e.to_string()))?;
                self.handler_for(transport)?
                    .handle_request(&parts, body, session, Attributes::new())
                    .await?
            }
            TransportRole::Polling | TransportRole::Streaming => {
                self.handle_sending(parts, session_id, transport).await?
            }
        };

        if transport.sends_no_cache() {
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        }
        Ok(response)
    }

    fn handler_for(
        &self,
        transport: TransportType,
    ) -> Result<Arc<dyn TransportHandler>, HttpTransportError> {
        self.handlers
            .get(&transport)
            .cloned()
            .ok_or(HttpTransportError::NotFound)
    }

    async fn handle_sending(
        &self,
        parts: Parts,
        session_id: SessionId,
        transport: TransportType,
    ) -> Result<Response, HttpTransportError> {
        let handler = self.handler_for(transport)?;
        handler.check_request(&parts)?;

        // A session that has not opened yet still takes its attributes from
        // the interceptors, whichever request gets to open it.
        if let Some(session) = self.registry.get(&session_id).await {
            if session.state().await != SessionState::Connecting {
                return handler
                    .handle_request(&parts, Bytes::new(), session, Attributes::new())
                    .await;
            }
        }

        let mut context = HandshakeContext::new(parts);
        let mut chain = InterceptorChain::new(&self.interceptors);
        if !chain.apply_before(&mut context).await {
            return Ok(context.take_response());
        }

        let principal = context.principal();
        let (session, created) = self
            .registry
            .get_or_insert_with(&session_id, || {
                Session::new(session_id.clone(), transport, principal, &self.context)
            })
            .await;
        let result = handler
            .handle_request(
                &context.request,
                Bytes::new(),
                session,
                context.attributes.clone(),
            )
            .await;
        chain.apply_after(&context, None).await;

        let mut response = result?;
        if created && self.config.session_cookie_needed && !has_session_cookie(&context.request) {
            response
                .headers_mut()
                .insert(SET_COOKIE, HeaderValue::from_static("JSESSIONID=dummy;path=/"));
        }
        Ok(response)
    }

    async fn handle_websocket(
        &self,
        parts: Parts,
        session_id: SessionId,
    ) -> Result<Response, HttpTransportError> {
        if !self.config.websocket_enabled {
            return Err(HttpTransportError::NotFound);
        }

        let mut context = HandshakeContext::new(parts);
        let principal = context.principal();
        let (session, created) = self
            .registry
            .get_or_insert_with(&session_id, || {
                Session::new(
                    session_id.clone(),
                    TransportType::WebSocket,
                    principal,
                    &self.context,
                )
            })
            .await;

        let adapter = Arc::new(SocketSessionAdapter::new(session.clone()));
        let outcome = self
            .handshake
            .handle(&self.interceptors, &mut context, adapter)
            .await;

        let upgraded = matches!(outcome, Ok(HandshakeOutcome::Upgraded(_)));
        if created && !upgraded {
            self.registry.remove_if_same(&session).await;
        }
        Ok(outcome?.into_response())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Builder
// ════════════════════════════════════════════════════════════════════════════

pub struct TransportServiceBuilder {
    handler: Arc<dyn MessageHandler>,
    codec: Arc<dyn MessageCodec>,
    config: TransportConfig,
    prefix: String,
    strategy: Arc<dyn UpgradeStrategy>,
    interceptors: Vec<Arc<dyn HandshakeInterceptor>>,
    cors_origins: Vec<String>,
    registry: Option<Arc<SessionRegistry>>,
}

impl TransportServiceBuilder {
    fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            handler,
            codec: Arc::new(JsonMessageCodec),
            config: TransportConfig::default(),
            prefix: "/echo".to_string(),
            strategy: Arc::new(AxumUpgradeStrategy::new()),
            interceptors: Vec::new(),
            cors_origins: Vec::new(),
            registry: None,
        }
    }

    pub fn codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Mount point of the router. Surrounding slashes are normalized, so
    /// `echo`, `/echo` and `/echo/` are equivalent.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn upgrade_strategy(mut self, strategy: Arc<dyn UpgradeStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn HandshakeInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Arc<TransportService> {
        let config = Arc::new(self.config);

        let mut handlers: HashMap<TransportType, Arc<dyn TransportHandler>> = HashMap::new();
        for transport in TransportType::ALL {
            let handler: Arc<dyn TransportHandler> = match transport.role() {
                TransportRole::Native => continue,
                TransportRole::Receiving if transport == TransportType::JsonpSend => {
                    Arc::new(ReceivingTransportHandler::jsonp_send())
                }
                TransportRole::Receiving => Arc::new(ReceivingTransportHandler::xhr_send()),
                TransportRole::Polling | TransportRole::Streaming => {
                    Arc::new(SendingTransportHandler::new(transport, config.clone()))
                }
            };
            handlers.insert(handler.transport_type(), handler);
        }

        let mut interceptors = self.interceptors;
        let allowed_origins = config.allowed_origins_list();
        if !allowed_origins.is_empty() {
            interceptors.insert(0, Arc::new(OriginInterceptor::new(allowed_origins)));
        }

        Arc::new(TransportService {
            prefix: format!("/{}", self.prefix.trim_matches('/')),
            context: SessionContext::new(self.handler, self.codec, config.clone()),
            config,
            registry: self.registry.unwrap_or_default(),
            handlers,
            handshake: HandshakeHandler::new(self.strategy),
            interceptors,
            cors_origins: self.cors_origins,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct InfoResponse {
    websocket: bool,
    origins: Vec<&'static str>,
    cookie_needed: bool,
    entropy: u32,
}

/// GET {prefix} - greeting
async fn greeting() -> Response {
    ([(CONTENT_TYPE, "text/plain;charset=UTF-8")], GREETING).into_response()
}

/// GET {prefix}/info - server capabilities
async fn info(State(service): State<Arc<TransportService>>) -> Response {
    let info = InfoResponse {
        websocket: service.config.websocket_enabled,
        origins: vec!["*:*"],
        cookie_needed: service.config.session_cookie_needed,
        entropy: (Uuid::new_v4().as_u128() & u128::from(u32::MAX)) as u32,
    };
    ([(CACHE_CONTROL, NO_CACHE)], Json(info)).into_response()
}

/// OPTIONS {prefix}/info
async fn info_options(State(service): State<Arc<TransportService>>, headers: HeaderMap) -> Response {
    service.preflight_response(&headers, "OPTIONS, GET")
}

/// * {prefix}/{server}/{session}/{transport}
async fn dispatch(
    State(service): State<Arc<TransportService>>,
    Path((server, session, transport)): Path<(String, String, String)>,
    request: Request,
) -> Response {
    service
        .handle_transport_request(&server, &session, &transport, request)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

fn has_session_cookie(request: &Parts) -> bool {
    request
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|cookie| cookie.trim().starts_with("JSESSIONID="))
}
