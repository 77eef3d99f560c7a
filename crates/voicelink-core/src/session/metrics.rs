//! Connection metrics accumulated over a session.

use super::quality::{loss_rate, ConnectionQuality};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of latency samples kept for the rolling average.
pub const LATENCY_WINDOW_SIZE: usize = 100;

/// Fixed-size sliding window of latency samples, oldest dropped first.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new() -> Self {
        Self::with_capacity(LATENCY_WINDOW_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean of the retained samples, zero when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of connection metrics for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    /// Most recent latency sample in milliseconds.
    pub latency: f64,
    /// Mean of the last [`LATENCY_WINDOW_SIZE`] samples.
    pub average_latency: f64,
    pub packets_lost: u64,
    pub packets_received: u64,
    pub bytes_transferred: u64,
    /// Milliseconds since the session started, refreshed on each heartbeat.
    pub connection_uptime_ms: u64,
}

impl SessionMetrics {
    pub fn loss_rate(&self) -> f64 {
        loss_rate(self.packets_lost, self.packets_received)
    }

    /// Quality implied by the current latency and loss rate.
    pub fn quality(&self) -> ConnectionQuality {
        ConnectionQuality::classify(self.latency, self.loss_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod latency_window {
        use super::*;

        #[test]
        fn empty_mean_is_zero() {
            let window = LatencyWindow::new();
            assert!(window.is_empty());
            assert_eq!(window.mean(), 0.0);
        }

        #[test]
        fn mean_of_identical_samples() {
            let mut window = LatencyWindow::new();
            for _ in 0..5 {
                window.push(50.0);
            }
            assert_eq!(window.len(), 5);
            assert_eq!(window.mean(), 50.0);
        }

        #[test]
        fn keeps_only_the_most_recent_samples() {
            let mut window = LatencyWindow::new();
            for i in 0..250 {
                window.push(i as f64);
            }

            assert_eq!(window.len(), LATENCY_WINDOW_SIZE);
            // Samples 150..250 remain.
            let expected = (150..250).sum::<i32>() as f64 / 100.0;
            assert!((window.mean() - expected).abs() < 1e-9);
        }

        #[test]
        fn mean_matches_tail_for_every_prefix() {
            let samples: Vec<f64> = (0..180).map(|i| ((i * 37) % 500) as f64).collect();
            let mut window = LatencyWindow::new();

            for (n, sample) in samples.iter().enumerate() {
                window.push(*sample);
                let count = n + 1;
                let tail = &samples[count.saturating_sub(LATENCY_WINDOW_SIZE)..count];
                let expected = tail.iter().sum::<f64>() / tail.len() as f64;
                assert!((window.mean() - expected).abs() < 1e-9, "sample {}", count);
            }
        }

        #[test]
        fn zero_capacity_is_clamped() {
            let mut window = LatencyWindow::with_capacity(0);
            window.push(10.0);
            window.push(30.0);
            assert_eq!(window.len(), 1);
            assert_eq!(window.mean(), 30.0);
        }

        #[test]
        fn clear_empties_window() {
            let mut window = LatencyWindow::new();
            window.push(10.0);
            window.clear();
            assert!(window.is_empty());
            assert_eq!(window.mean(), 0.0);
        }
    }

    mod session_metrics {
        use super::*;

        #[test]
        fn default_is_excellent() {
            let metrics = SessionMetrics::default();
            assert_eq!(metrics.loss_rate(), 0.0);
            assert_eq!(metrics.quality(), ConnectionQuality::Excellent);
        }

        #[test]
        fn ten_percent_loss_is_poor() {
            let metrics = SessionMetrics {
                packets_lost: 10,
                packets_received: 100,
                ..SessionMetrics::default()
            };
            assert_eq!(metrics.quality(), ConnectionQuality::Poor);
        }

        #[test]
        fn serializes_camel_case() {
            let metrics = SessionMetrics {
                average_latency: 12.5,
                ..SessionMetrics::default()
            };
            let json = serde_json::to_value(&metrics).unwrap();
            assert_eq!(json["averageLatency"], 12.5);
            assert_eq!(json["connectionUptimeMs"], 0);
        }
    }
}
