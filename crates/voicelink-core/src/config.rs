//! Static lifecycle configuration.
//!
//! Supplied once when the manager is built and never mutated afterwards.
//! Stored on disk as camelCase JSON; every field is optional and falls back
//! to the defaults below.
//!
//! ```json
//! {
//!   "agentId": "agent_01",
//!   "reconnectAttempts": 3,
//!   "reconnectDelayMs": 1000,
//!   "heartbeatIntervalMs": 5000,
//!   "timeoutDurationMs": 15000,
//!   "enableLogging": true
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What `initialize` does when a session is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReinitializePolicy {
    /// Tear the old session down (timers, audio stream) and start the new one.
    #[default]
    Replace,
    /// Refuse with `SessionError::AlreadyActive` until the caller disconnects.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LifecycleConfig {
    /// Conversational agent identifier, passed through untouched.
    pub agent_id: String,
    /// Sessions running longer than this are disconnected. Zero disables the limit.
    pub max_duration_ms: u64,
    pub reconnect_attempts: u32,
    /// Base delay for the reconnect backoff.
    pub reconnect_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub timeout_duration_ms: u64,
    /// How often the timeout watch compares the last heartbeat with the timeout.
    pub timeout_check_interval_ms: u64,
    /// Gates per-session diagnostic logging.
    pub enable_logging: bool,
    pub reinitialize_policy: ReinitializePolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            max_duration_ms: 30 * 60 * 1000,
            reconnect_attempts: 3,
            reconnect_delay_ms: 1000,
            heartbeat_interval_ms: 5000,
            timeout_duration_ms: 15_000,
            timeout_check_interval_ms: 1000,
            enable_logging: false,
            reinitialize_policy: ReinitializePolicy::default(),
        }
    }
}

impl LifecycleConfig {
    /// Parse and validate a JSON config string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Reject intervals that would make the timers spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeatIntervalMs must be greater than zero".to_string(),
            ));
        }
        if self.timeout_check_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeoutCheckIntervalMs must be greater than zero".to_string(),
            ));
        }
        if self.timeout_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeoutDurationMs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_duration_ms)
    }

    pub fn timeout_check_interval(&self) -> Duration {
        Duration::from_millis(self.timeout_check_interval_ms)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration_ms > 0).then(|| Duration::from_millis(self.max_duration_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reconnect_attempts,
            Duration::from_millis(self.reconnect_delay_ms),
        )
    }
}
