//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SOCKJS_TRANSPORT` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use sockjs_transport::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Heartbeat every {:?}", config.transport.heartbeat_interval());
//! ```

mod error;
mod server;
mod transport;

pub use error::{ConfigError, ValidationError};
pub use server::ServerConfig;
pub use transport::TransportConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// configuration. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (bind address, logging, mount prefix)
    #[serde(default)]
    pub server: ServerConfig,

    /// Session and transport budgets
    #[serde(default)]
    pub transport: TransportConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SOCKJS_TRANSPORT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SOCKJS_TRANSPORT__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SOCKJS_TRANSPORT__TRANSPORT__HEARTBEAT_INTERVAL_MS=10000` -> `transport.heartbeat_interval_ms = 10000`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SOCKJS_TRANSPORT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.transport.validate()?;
        Ok(())
    }
}
