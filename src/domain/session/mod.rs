//! Session vocabulary shared by every carrier.
//!
//! The live session object (state, heartbeat, active connection) lives in the
//! application layer; this module only holds the value types it is built from.

mod close_status;
mod id;
mod state;

use std::collections::HashMap;

pub use close_status::CloseStatus;
pub use id::{Principal, SessionId};
pub use state::SessionState;

/// Attributes collected during the handshake and copied into the session.
pub type Attributes = HashMap<String, serde_json::Value>;
