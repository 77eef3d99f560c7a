//! Session event broadcasting.
//!
//! The EventBus fans [`SessionEvent`]s out to every interested consumer (UI
//! bindings, transcript writers, the daemon's stdout printer) from the single
//! lifecycle manager that produces them.
//!
//! # Example
//!
//! ```rust
//! use voicelink_core::event_bus::EventBus;
//! use voicelink_core::session::{SessionEvent, SessionStatus};
//!
//! let event_bus = EventBus::new();
//!
//! // Subscribe to events
//! let mut rx = event_bus.subscribe().unwrap();
//!
//! // Emit an event
//! event_bus.emit(SessionEvent::StatusChanged { status: SessionStatus::Connected });
//!
//! // Receive the event (in async context)
//! // let event = rx.recv().await.unwrap();
//! ```

use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use tokio::sync::broadcast;

use crate::session::SessionEvent;

/// Default channel capacity for the event bus.
/// Events beyond this capacity will cause slow subscribers to miss events (lag).
const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel for session events that can be closed for good.
///
/// Closing drops the sender: existing receivers drain what is buffered and
/// then see `RecvError::Closed`, and no new subscriptions are accepted.
pub struct EventBus {
    sender: RwLock<Option<broadcast::Sender<SessionEvent>>>,
}

impl EventBus {
    /// Create a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new EventBus with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event. With no
    /// subscribers, or once the bus is closed, the event is dropped and 0 is
    /// returned.
    pub fn emit(&self, event: SessionEvent) -> usize {
        let guard = self.read_sender();
        match guard.as_ref() {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Subscribe to all future events. `None` once the bus is closed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<SessionEvent>> {
        let guard = self.read_sender();
        guard.as_ref().map(broadcast::Sender::subscribe)
    }

    /// Get the current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        let guard = self.read_sender();
        guard.as_ref().map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drop the sender. Idempotent.
    pub fn close(&self) {
        let mut guard = self.sender.write().unwrap_or_else(PoisonError::into_inner);
        guard.take();
    }

    pub fn is_closed(&self) -> bool {
        self.read_sender().is_none()
    }

    fn read_sender(&self) -> RwLockReadGuard<'_, Option<broadcast::Sender<SessionEvent>>> {
        self.sender.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
