//! Native socket negotiation.
//!
//! [`HandshakeHandler::handle`] runs the interceptor chain around
//! [`HandshakeHandler::do_handshake`]. Two failure classes stay apart:
//!
//! - a request that does not satisfy the protocol is a *rejected* outcome
//!   carrying a normal response that explains why
//! - an infrastructure failure inside the upgrade is a [`HandshakeFailure`],
//!   which the caller maps to a 500

use axum::response::Response;
use http::header::{
    HeaderValue, ALLOW, CONNECTION, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL,
    SEC_WEBSOCKET_VERSION, UPGRADE,
};
use http::{Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ports::{
    Extension, HandshakeContext, HandshakeFailure, HandshakeInterceptor, SocketHandler,
    UpgradeStrategy,
};

/// Result of a negotiation that did not fail internally.
#[derive(Debug)]
pub enum HandshakeOutcome {
    /// The connection was upgraded; the response completes the upgrade.
    Upgraded(Response),
    /// The negotiation was refused; the response explains why.
    Rejected(Response),
}

impl HandshakeOutcome {
    pub fn is_upgraded(&self) -> bool {
        matches!(self, HandshakeOutcome::Upgraded(_))
    }

    pub fn into_response(self) -> Response {
        match self {
            HandshakeOutcome::Upgraded(response) | HandshakeOutcome::Rejected(response) => {
                response
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Interceptor chain
// ════════════════════════════════════════════════════════════════════════════

/// Per-request walk over the registered interceptors.
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn HandshakeInterceptor>>,
    accepted: usize,
}

impl InterceptorChain {
    pub fn new(interceptors: &[Arc<dyn HandshakeInterceptor>]) -> Self {
        Self {
            interceptors: interceptors.to_vec(),
            accepted: 0,
        }
    }

    /// Runs `before_handshake` in registration order.
    ///
    /// Stops at the first interceptor that returns false; the interceptors
    /// that accepted before it then get `after_handshake` right away.
    pub async fn apply_before(&mut self, context: &mut HandshakeContext) -> bool {
        for interceptor in &self.interceptors {
            if !interceptor.before_handshake(context).await {
                debug!(
                    uri = %context.request.uri,
                    accepted = self.accepted,
                    "Handshake vetoed by interceptor"
                );
                self.apply_after(context, None).await;
                return false;
            }
            self.accepted += 1;
        }
        true
    }

    /// Runs `after_handshake` in reverse order on every interceptor whose
    /// `before_handshake` accepted.
    pub async fn apply_after(&self, context: &HandshakeContext, failure: Option<&HandshakeFailure>) {
        for interceptor in self.interceptors[..self.accepted].iter().rev() {
            interceptor.after_handshake(context, failure).await;
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Handshake handler
// ════════════════════════════════════════════════════════════════════════════

pub struct HandshakeHandler {
    strategy: Arc<dyn UpgradeStrategy>,
}

impl HandshakeHandler {
    pub fn new(strategy: Arc<dyn UpgradeStrategy>) -> Self {
        Self { strategy }
    }

    /// Negotiates with the interceptor chain wrapped around the handshake.
    ///
    /// # Errors
    ///
    /// Returns `HandshakeFailure` when the upgrade itself failed; every
    /// interceptor that accepted has seen the failure by then.
    pub async fn handle(
        &self,
        interceptors: &[Arc<dyn HandshakeInterceptor>],
        context: &mut HandshakeContext,
        socket_handler: Arc<dyn SocketHandler>,
    ) -> Result<HandshakeOutcome, HandshakeFailure> {
        let mut chain = InterceptorChain::new(interceptors);
        if !chain.apply_before(context).await {
            return Ok(HandshakeOutcome::Rejected(context.take_response()));
        }

        match self.do_handshake(context, socket_handler).await {
            Ok(outcome) => {
                chain.apply_after(context, None).await;
                Ok(outcome)
            }
            Err(failure) => {
                warn!(uri = %context.request.uri, error = %failure, "Handshake failed");
                chain.apply_after(context, Some(&failure)).await;
                Err(failure)
            }
        }
    }

    /// Validates the upgrade request, negotiates sub-protocol and
    /// extensions, then hands the connection to the upgrade strategy.
    pub async fn do_handshake(
        &self,
        context: &mut HandshakeContext,
        socket_handler: Arc<dyn SocketHandler>,
    ) -> Result<HandshakeOutcome, HandshakeFailure> {
        if let Some(rejection) = self.validate(context) {
            return Ok(rejection);
        }

        let requested = requested_protocols(context);
        context.sub_protocol = select_protocol(&requested, &socket_handler.sub_protocols());

        let supported = self.strategy.supported_extensions(&context.request);
        context.extensions = Extension::parse_headers(&context.request.headers)
            .into_iter()
            .filter(|requested| supported.iter().any(|s| s.name() == requested.name()))
            .collect();

        debug!(
            uri = %context.request.uri,
            sub_protocol = ?context.sub_protocol,
            extensions = context.extensions.len(),
            "Upgrading connection"
        );

        let principal = context.principal();
        let mut response = self
            .strategy
            .upgrade(
                &mut context.request,
                context.sub_protocol.clone(),
                context.extensions.clone(),
                principal,
                socket_handler,
                context.attributes.clone(),
            )
            .await?;

        for (name, value) in context.response.headers.iter() {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        Ok(HandshakeOutcome::Upgraded(response))
    }

    fn validate(&self, context: &mut HandshakeContext) -> Option<HandshakeOutcome> {
        let headers = &context.request.headers;

        if context.request.method != Method::GET {
            context
                .response
                .headers
                .insert(ALLOW, HeaderValue::from_static("GET"));
            return Some(reject(context, StatusCode::METHOD_NOT_ALLOWED, ""));
        }

        let upgrade = header_str(headers, UPGRADE);
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Some(reject(
                context,
                StatusCode::BAD_REQUEST,
                "Can \"Upgrade\" only to \"WebSocket\".",
            ));
        }

        let connection_ok = header_str(headers, CONNECTION)
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
        if !connection_ok {
            return Some(reject(
                context,
                StatusCode::BAD_REQUEST,
                "\"Connection\" must be \"upgrade\".",
            ));
        }

        let version = header_str(headers, SEC_WEBSOCKET_VERSION).to_string();
        let supported = self.strategy.supported_versions();
        if !supported.iter().any(|v| *v == version) {
            if let Ok(value) = HeaderValue::from_str(&supported.join(", ")) {
                context.response.headers.insert(SEC_WEBSOCKET_VERSION, value);
            }
            return Some(reject(
                context,
                StatusCode::UPGRADE_REQUIRED,
                format!("Unsupported version \"{version}\""),
            ));
        }

        if header_str(headers, SEC_WEBSOCKET_KEY).is_empty() {
            return Some(reject(
                context,
                StatusCode::BAD_REQUEST,
                "Missing \"Sec-WebSocket-Key\" header",
            ));
        }
        None
    }
}

fn reject(
    context: &mut HandshakeContext,
    status: StatusCode,
    body: impl Into<String>,
) -> HandshakeOutcome {
    let body = body.into();
    debug!(uri = %context.request.uri, %status, reason = %body, "Handshake rejected");
    context.reject(status, body);
    HandshakeOutcome::Rejected(context.take_response())
}

fn header_str(headers: &http::HeaderMap, name: http::header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

fn requested_protocols(context: &HandshakeContext) -> Vec<String> {
    context
        .request
        .headers
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// First requested protocol the handler supports, compared case-insensitively.
fn select_protocol(requested: &[String], supported: &[String]) -> Option<String> {
    requested
        .iter()
        .find(|r| supported.iter().any(|s| s.eq_ignore_ascii_case(r)))
        .cloned()
}
