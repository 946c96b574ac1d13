//! UpgradeStrategy port - the host runtime's native protocol upgrade.
//!
//! This is the only seam that touches host-specific socket APIs. Everything
//! else in the crate talks to [`SocketHandler`] and [`Connection`](super::Connection).

use async_trait::async_trait;
use axum::response::Response;
use http::request::Parts;
use std::sync::Arc;

use crate::domain::session::{Attributes, Principal};

use super::{Extension, HandshakeFailure, SocketHandler};

#[async_trait]
pub trait UpgradeStrategy: Send + Sync {
    /// `Sec-WebSocket-Version` values the runtime accepts.
    fn supported_versions(&self) -> Vec<String>;

    /// Extensions the runtime can enable for this request.
    fn supported_extensions(&self, request: &Parts) -> Vec<Extension>;

    /// Performs the upgrade and returns the switching-protocols response.
    ///
    /// The runtime calls back into `handler` once the connection is live.
    #[allow(clippy::too_many_arguments)]
    async fn upgrade(
        &self,
        request: &mut Parts,
        sub_protocol: Option<String>,
        extensions: Vec<Extension>,
        principal: Option<Principal>,
        handler: Arc<dyn SocketHandler>,
        attributes: Attributes,
    ) -> Result<Response, HandshakeFailure>;
}
