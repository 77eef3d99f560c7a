//! Outbound notifications emitted by the lifecycle manager.

use super::metrics::SessionMetrics;
use super::quality::ConnectionQuality;
use super::state::SessionStatus;
use serde::{Deserialize, Serialize};

/// Everything a caller can observe about a session without polling.
///
/// Each state mutation emits at most one event of each kind, before the call
/// that caused it returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The lifecycle status changed.
    StatusChanged { status: SessionStatus },

    /// The connection quality category changed.
    QualityChanged { quality: ConnectionQuality },

    /// A latency, byte or packet counter was updated.
    MetricsUpdated { metrics: SessionMetrics },

    /// A reconnect attempt was scheduled. Attempts are numbered from 1.
    Reconnecting { attempt: u32 },

    /// No heartbeat within the timeout window.
    TimedOut,
}

impl SessionEvent {
    /// Stable event name, e.g. for routing or transcript lines.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "session:status",
            Self::QualityChanged { .. } => "session:quality",
            Self::MetricsUpdated { .. } => "session:metrics",
            Self::Reconnecting { .. } => "session:reconnect",
            Self::TimedOut => "session:timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_changed_serializes_with_kind() {
        let event = SessionEvent::StatusChanged {
            status: SessionStatus::Connected,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"kind": "statusChanged", "status": "connected"}));
    }

    #[test]
    fn timed_out_has_only_kind() {
        let value = serde_json::to_value(SessionEvent::TimedOut).unwrap();
        assert_eq!(value, json!({"kind": "timedOut"}));
    }

    #[test]
    fn deserializes_reconnecting() {
        let event: SessionEvent =
            serde_json::from_value(json!({"kind": "reconnecting", "attempt": 2})).unwrap();
        assert_eq!(event, SessionEvent::Reconnecting { attempt: 2 });
    }

    #[test]
    fn event_types_are_distinct() {
        let events = [
            SessionEvent::StatusChanged {
                status: SessionStatus::Paused,
            },
            SessionEvent::QualityChanged {
                quality: ConnectionQuality::Fair,
            },
            SessionEvent::MetricsUpdated {
                metrics: SessionMetrics::default(),
            },
            SessionEvent::Reconnecting { attempt: 1 },
            SessionEvent::TimedOut,
        ];
        let mut names: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), events.len());
    }
}
