//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the protocol core and the outside world. Adapters implement these ports.
//!
//! ## Session Ports
//!
//! - `MessageHandler` - Application callbacks, reached through `SessionHandle`
//! - `MessageCodec` - JSON encoding of message batches
//! - `Connection` - The physical carrier attached to a session
//!
//! ## Negotiation Ports
//!
//! - `HandshakeInterceptor` - Inspect, annotate or veto a negotiation
//! - `UpgradeStrategy` - Host-runtime specific native upgrade
//! - `SocketHandler` - Callbacks of one upgraded raw connection

mod connection;
mod handshake;
mod message_codec;
mod message_handler;
mod socket_handler;
mod upgrade_strategy;

pub use connection::{Connection, Delivery, TransportError};
pub use handshake::{
    Extension, HandshakeContext, HandshakeFailure, HandshakeInterceptor, HandshakeResponse,
};
pub use message_codec::{CodecError, MessageCodec};
pub use message_handler::{find_sub_protocols, HandlerError, MessageHandler, SessionHandle};
pub use socket_handler::SocketHandler;
pub use upgrade_strategy::UpgradeStrategy;
