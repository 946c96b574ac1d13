//! Native WebSocket adapter.
//!
//! The only module that touches axum's socket types. Everything above it
//! sees [`UpgradeStrategy`](crate::ports::UpgradeStrategy) and
//! [`Connection`](crate::ports::Connection).

mod connection;
mod upgrade;

pub use connection::AxumSocketConnection;
pub use upgrade::AxumUpgradeStrategy;
