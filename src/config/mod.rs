use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::DEFAULT_SSH_PORT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where and how to reach a controller.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_port")]
    pub port: String,
    /// Start `gpascii` without the `-2` flag
    #[serde(default)]
    pub short_startup: bool,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> String {
    DEFAULT_SSH_PORT.to_string()
}

impl ConnectionConfig {
    pub fn new(host: &str, user: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            port: default_port(),
            short_startup: false,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        if config.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        Ok(config)
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("short_startup", &self.short_startup)
            .finish_non_exhaustive()
    }
}

/// Timing knobs for a session. All values are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub common_timeout_ms: u64,
    pub lock_wait_ms: u64,
    pub handshake_write_timeout_ms: u64,
    pub handshake_read_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            common_timeout_ms: 1000,
            lock_wait_ms: 200,
            handshake_write_timeout_ms: 1000,
            handshake_read_timeout_ms: 2000,
        }
    }
}

impl SessionSettings {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("common_timeout_ms", self.common_timeout_ms),
            ("lock_wait_ms", self.lock_wait_ms),
            ("handshake_write_timeout_ms", self.handshake_write_timeout_ms),
            ("handshake_read_timeout_ms", self.handshake_read_timeout_ms),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn handshake_write_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_write_timeout_ms)
    }

    pub fn handshake_read_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_read_timeout_ms)
    }
}
