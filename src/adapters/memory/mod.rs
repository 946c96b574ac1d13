//! In-memory adapters for testing.
//!
//! # Security Note
//!
//! These adapters are for **testing only** and should not be used in
//! production. They use `.expect()` on lock operations which will panic if
//! locks are poisoned.

mod connection;
mod handler;

pub use connection::InMemoryConnection;
pub use handler::{EventLog, HandlerEvent, RecordingMessageHandler};
