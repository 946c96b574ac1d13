//! Close codes carried by CLOSE frames and native close handshakes.

use std::borrow::Cow;
use std::fmt;

/// A close code with its human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CloseStatus {
    code: u16,
    reason: Cow<'static, str>,
}

impl CloseStatus {
    /// Normal closure.
    pub const NORMAL: CloseStatus = CloseStatus::from_static(1000, "");

    /// The peer went away without a close frame.
    pub const GOING_AWAY: CloseStatus = CloseStatus::from_static(1001, "");

    /// Close frame carried no status code.
    pub const NO_STATUS: CloseStatus = CloseStatus::from_static(1005, "");

    /// Connection dropped without a close handshake.
    pub const NO_CLOSE_FRAME: CloseStatus = CloseStatus::from_static(1006, "");

    /// Inbound data could not be decoded.
    pub const BAD_DATA: CloseStatus = CloseStatus::from_static(1007, "");

    /// The server hit an unexpected condition.
    pub const SERVER_ERROR: CloseStatus = CloseStatus::from_static(1011, "");

    /// A second connection tried to attach to a session that already has one.
    pub const ANOTHER_CONNECTION_OPEN: CloseStatus =
        CloseStatus::from_static(2010, "Another connection still open");

    /// The session was rejected or has already been closed.
    pub const GO_AWAY: CloseStatus = CloseStatus::from_static(3000, "Go away!");

    /// Creates a status with an owned reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: Cow::Owned(reason.into()),
        }
    }

    const fn from_static(code: u16, reason: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}
