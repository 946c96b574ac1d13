//! SockJS Transport - real-time sessions over WebSockets or HTTP fallbacks
//!
//! A logical, carrier-independent session is carried either by a native
//! WebSocket or emulated over HTTP polling and streaming. Application code
//! implements [`ports::MessageHandler`] and never sees which carrier is in use.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
