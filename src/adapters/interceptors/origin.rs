//! Origin check for cross-origin session creation and upgrades.

use async_trait::async_trait;
use axum::http::header::{HOST, ORIGIN};
use axum::http::StatusCode;
use tracing::debug;
use url::Url;

use crate::ports::{HandshakeContext, HandshakeInterceptor};

/// Rejects requests whose `Origin` is neither same-origin nor allowed.
///
/// An allowed list containing `*` accepts every origin. Requests without an
/// `Origin` header are not cross-origin browser requests and pass.
#[derive(Debug, Clone)]
pub struct OriginInterceptor {
    allowed: Vec<String>,
}

impl OriginInterceptor {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|origin| origin.trim_end_matches('/').to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/').to_ascii_lowercase();
        self.allowed.iter().any(|a| a == "*" || *a == origin)
    }
}

fn is_same_origin(origin: &str, host: Option<&str>) -> bool {
    let (Ok(origin), Some(host)) = (Url::parse(origin), host) else {
        return false;
    };
    let Some(origin_host) = origin.host_str() else {
        return false;
    };
    let origin_authority = match origin.port() {
        Some(port) => format!("{origin_host}:{port}"),
        None => origin_host.to_string(),
    };
    origin_authority.eq_ignore_ascii_case(host)
}

#[async_trait]
impl HandshakeInterceptor for OriginInterceptor {
    async fn before_handshake(&self, context: &mut HandshakeContext) -> bool {
        let headers = &context.request.headers;
        let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) else {
            return true;
        };
        let host = headers.get(HOST).and_then(|v| v.to_str().ok());

        if is_same_origin(origin, host) || self.is_allowed(origin) {
            return true;
        }

        debug!(origin, "Origin not allowed");
        context.reject(StatusCode::FORBIDDEN, "");
        false
    }
}
