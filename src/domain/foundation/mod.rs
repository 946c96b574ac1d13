//! Foundation module - Shared domain primitives.
//!
//! Contains the error vocabulary and the state machine contract shared by
//! the session and transport types.

mod errors;
mod state_machine;

pub use errors::ValidationError;
pub use state_machine::StateMachine;
