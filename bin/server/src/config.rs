//! Centralized server configuration.
//!
//! Strongly-typed configuration loaded via the `config` crate from
//! environment variables, e.g. `LISTEN_ADDR` and `ROOM__BACKLOG_WARN`.

use serde::Deserialize;

/// Relay server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Per-room tuning.
    #[serde(default)]
    pub room: RoomConfig,
}

/// Room-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    /// Backlog length above which the room logs a warning. The backlog
    /// is kept whole so resyncs can always replay it; replay is safe
    /// because operation application is idempotent.
    #[serde(default = "default_backlog_warn")]
    pub backlog_warn: usize,
}

fn default_listen_addr() -> String {
    "127.0.0.1:4800".to_string()
}

fn default_backlog_warn() -> usize {
    10_000
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            backlog_warn: default_backlog_warn(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if present configuration values fail to parse.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
