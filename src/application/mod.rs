//! Application layer - sessions and negotiation.
//!
//! This layer owns the logical session state machine and the native
//! handshake flow. It talks to the outside world only through ports.

pub mod decorators;
pub mod handshake;
pub mod session;
pub mod socket_adapter;

pub use decorators::{ErrorTrappingMessageHandler, LoggingMessageHandler};
pub use handshake::{HandshakeHandler, HandshakeOutcome, InterceptorChain};
pub use session::{Admission, Session, SessionContext, SessionRegistry};
pub use socket_adapter::SocketSessionAdapter;
