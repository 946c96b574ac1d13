//! SessionState enum for tracking the lifecycle of a logical session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle state of a session. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Connecting,
    Open,
    Closed,
}

impl SessionState {
    /// Returns true once the session has reached CLOSED.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Returns true while frames may flow.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }
}

impl StateMachine for SessionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Connecting, Open) | (Connecting, Closed) | (Open, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionState::*;
        match self {
            Connecting => vec![Open, Closed],
            Open => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "CONNECTING",
            SessionState::Open => "OPEN",
            SessionState::Closed => "CLOSED",
        };
        write!(f, "{}", s)
    }
}
