//! # voicelink-core
//!
//! Session lifecycle tracking for the voicelink voice-assistant front end.
//!
//! The conversational SDK owns the audio and the network. This crate keeps the
//! bookkeeping around it honest and is framework-agnostic, so it can sit behind:
//! - the browser bindings (via the UI layer)
//! - the `voicelink-daemon` line-command driver
//!
//! ## Key Concepts
//!
//! - **Session**: one logical conversation, bounded by initialize/disconnect
//! - **Heartbeat**: periodic liveness stamp; a stale one trips the timeout watch
//! - **Connection quality**: excellent/good/fair/poor from latency and packet loss
//! - **SessionEvent**: every observable change, fanned out on the [`event_bus::EventBus`]

pub mod config;
pub mod event_bus;
pub mod session;
pub mod transcript;

// Re-export commonly used types
pub use config::{LifecycleConfig, ReinitializePolicy};
pub use session::{
    ConnectionQuality, SessionError, SessionEvent, SessionId, SessionLifecycleManager,
    SessionMetrics, SessionState, SessionStatus,
};
