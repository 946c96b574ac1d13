//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the session layer to the outside world:
//! - `codec` - JSON message codec
//! - `websocket` - axum native socket upgrade
//! - `http` - polling, streaming and receiving transports, plus the router
//! - `interceptors` - handshake interceptors
//! - `memory` - in-memory doubles for tests

pub mod codec;
pub mod http;
pub mod interceptors;
pub mod memory;
pub mod websocket;

pub use codec::JsonMessageCodec;
pub use http::{TransportService, TransportServiceBuilder};
pub use interceptors::OriginInterceptor;
pub use memory::{InMemoryConnection, RecordingMessageHandler};
pub use websocket::{AxumSocketConnection, AxumUpgradeStrategy};
