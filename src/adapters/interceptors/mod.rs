//! Handshake interceptors shipped with the crate.

mod origin;

pub use origin::OriginInterceptor;
