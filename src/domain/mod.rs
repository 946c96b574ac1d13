//! Domain layer containing the protocol vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (validation errors, state machine trait)
//! - `frame` - Wire frames and their transport-specific formats
//! - `session` - Session ids, lifecycle state, close codes, attributes
//! - `transport` - Carrier descriptors used as dispatch keys

pub mod foundation;
pub mod frame;
pub mod session;
pub mod transport;
