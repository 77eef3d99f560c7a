//! Connection quality classification.
//!
//! Quality is re-derived from the current counters on every sample. There is
//! no hysteresis: the same latency and loss rate always give the same answer.

use serde::{Deserialize, Serialize};

/// Categorical connection quality, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

impl ConnectionQuality {
    /// Classify a latency (ms) and a packet loss rate (0.0..=1.0).
    pub fn classify(latency_ms: f64, loss_rate: f64) -> Self {
        if latency_ms < 100.0 && loss_rate < 0.01 {
            Self::Excellent
        } else if latency_ms < 200.0 && loss_rate < 0.02 {
            Self::Good
        } else if latency_ms < 400.0 && loss_rate < 0.05 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl std::fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        };
        f.write_str(name)
    }
}

/// Lost packets over received packets; zero when nothing was received.
pub fn loss_rate(packets_lost: u64, packets_received: u64) -> f64 {
    if packets_received == 0 {
        return 0.0;
    }
    packets_lost as f64 / packets_received as f64
}
