//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid host address: {0}")]
    InvalidHost(String),

    #[error("Path prefix must start with '/'")]
    InvalidPrefix,

    #[error("Heartbeat interval must be greater than zero")]
    InvalidHeartbeatInterval,

    #[error("Disconnect delay must be greater than zero")]
    InvalidDisconnectDelay,

    #[error("Streaming bytes limit must be greater than zero")]
    InvalidStreamingLimit,

    #[error("Streaming time limit must be greater than zero when set")]
    InvalidStreamingTimeLimit,

    #[error("HTTP message cache size must be greater than zero")]
    InvalidCacheSize,
}
