//! Transport configuration
//!
//! Every timing and size budget of the session layer is read from here.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Session and transport tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Idle time after which a heartbeat frame is sent
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// How long an HTTP session may go without a receiving request
    #[serde(default = "default_disconnect_delay_ms")]
    pub disconnect_delay_ms: u64,

    /// Bytes a streaming response may carry before it is completed
    #[serde(default = "default_streaming_bytes_limit")]
    pub streaming_bytes_limit: usize,

    /// Wall-clock budget of a streaming response, unlimited when unset
    pub streaming_time_limit_ms: Option<u64>,

    /// Outbound messages kept while no HTTP request is attached
    #[serde(default = "default_http_message_cache_size")]
    pub http_message_cache_size: usize,

    /// Whether the native socket transport is offered
    #[serde(default = "default_true")]
    pub websocket_enabled: bool,

    /// Reported to clients by the info endpoint
    #[serde(default)]
    pub session_cookie_needed: bool,

    /// Origins accepted by the origin interceptor (comma-separated); unset accepts any
    pub allowed_origins: Option<String>,

    /// How often expired sessions are swept; defaults to the disconnect delay
    pub sweep_interval_ms: Option<u64>,
}

impl TransportConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn disconnect_delay(&self) -> Duration {
        Duration::from_millis(self.disconnect_delay_ms)
    }

    pub fn streaming_time_limit(&self) -> Option<Duration> {
        self.streaming_time_limit_ms.map(Duration::from_millis)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.unwrap_or(self.disconnect_delay_ms))
    }

    /// Allowed origins as a vector; empty means any origin.
    pub fn allowed_origins_list(&self) -> Vec<String> {
        self.allowed_origins
            .as_ref()
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate transport configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ValidationError::InvalidHeartbeatInterval);
        }
        if self.disconnect_delay_ms == 0 || self.sweep_interval_ms == Some(0) {
            return Err(ValidationError::InvalidDisconnectDelay);
        }
        if self.streaming_bytes_limit == 0 {
            return Err(ValidationError::InvalidStreamingLimit);
        }
        if self.streaming_time_limit_ms == Some(0) {
            return Err(ValidationError::InvalidStreamingTimeLimit);
        }
        if self.http_message_cache_size == 0 {
            return Err(ValidationError::InvalidCacheSize);
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            disconnect_delay_ms: default_disconnect_delay_ms(),
            streaming_bytes_limit: default_streaming_bytes_limit(),
            streaming_time_limit_ms: None,
            http_message_cache_size: default_http_message_cache_size(),
            websocket_enabled: true,
            session_cookie_needed: false,
            allowed_origins: None,
            sweep_interval_ms: None,
        }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    25_000
}

fn default_disconnect_delay_ms() -> u64 {
    5_000
}

fn default_streaming_bytes_limit() -> usize {
    128 * 1024
}

fn default_http_message_cache_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}
