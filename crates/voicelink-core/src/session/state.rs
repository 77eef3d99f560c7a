//! Per-session state.

use super::quality::ConnectionQuality;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Initializing,
    Connecting,
    Connected,
    /// The remote agent is speaking or listening.
    Active,
    Paused,
    Reconnecting,
    Disconnecting,
    Disconnected,
    Error,
}

impl SessionStatus {
    /// Connected, active or paused.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connected | Self::Active | Self::Paused)
    }

    /// Whether a session id is expected to be present in this status.
    pub fn holds_session(self) -> bool {
        !matches!(self, Self::Uninitialized | Self::Disconnected)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Reconnecting => "reconnecting",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// The single record describing one logical conversation session.
///
/// Only the lifecycle manager writes it; callers get clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Set at initialize, cleared at disconnect.
    pub id: Option<SessionId>,

    pub status: SessionStatus,

    pub start_time: Option<DateTime<Utc>>,

    /// Recorded once, on the first disconnect of the session.
    pub end_time: Option<DateTime<Utc>>,

    pub connection_quality: ConnectionQuality,

    /// Attempts made since the last initialize.
    pub reconnect_count: u32,

    pub last_heartbeat: Option<DateTime<Utc>>,

    /// Side-channel bag owned by the caller.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SessionState {
    /// Fresh state for a newly initialized session.
    pub fn initializing(id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            status: SessionStatus::Initializing,
            start_time: Some(now),
            last_heartbeat: Some(now),
            ..Self::default()
        }
    }

    /// Wall-clock duration of the session.
    ///
    /// Uses `end_time` once the session is over, the current time otherwise.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or_else(Utc::now);
        Some(end - start)
    }
}
