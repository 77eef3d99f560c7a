//! Session lifecycle for a single live conversation.
//!
//! One [`SessionLifecycleManager`] owns one logical session at a time:
//! identity, status transitions, heartbeat and timeout detection, bounded
//! reconnection, and the connection quality score.

mod error;
mod event;
mod manager;
mod metrics;
mod quality;
mod retry;
mod state;
mod transport;

pub use error::SessionError;
pub use event::SessionEvent;
pub use manager::SessionLifecycleManager;
pub use metrics::{LatencyWindow, SessionMetrics, LATENCY_WINDOW_SIZE};
pub use quality::{loss_rate, ConnectionQuality};
pub use retry::RetryPolicy;
pub use state::{SessionId, SessionState, SessionStatus};
pub use transport::{ExternalTransport, MediaStream, Transport, TransportError};
