//! Message codec adapters.

mod json;

pub use json::JsonMessageCodec;
