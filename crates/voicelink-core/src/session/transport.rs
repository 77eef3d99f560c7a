//! Seams to the conversational SDK and the microphone stream.
//!
//! The lifecycle manager never talks to the network or the audio device
//! itself. Callers plug the SDK in through [`Transport`] and hand over the
//! captured stream through [`MediaStream`].

use super::state::SessionId;
use thiserror::Error;

/// Failure reported by the delegated connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Connection owned by the external SDK.
///
/// Called with the session lock held; implementations must not call back
/// into the manager.
pub trait Transport: Send + Sync {
    /// Open the conversation. Called by `connect()` and by every reconnect attempt.
    fn open(&self, session_id: &SessionId) -> Result<(), TransportError>;

    /// Liveness probe consulted on each heartbeat tick.
    ///
    /// A transport that reports `false` stops the heartbeat from being stamped,
    /// which eventually trips the timeout watch.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Transport for callers that connect the SDK themselves and only mirror
/// its state into the manager. Always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalTransport;

impl Transport for ExternalTransport {
    fn open(&self, _session_id: &SessionId) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Captured audio stream whose tracks the manager stops on teardown.
pub trait MediaStream: Send {
    /// Stop every track of the stream. Must tolerate repeated calls.
    fn stop_tracks(&mut self);

    /// Number of tracks still producing audio.
    fn live_tracks(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_transport_always_opens() {
        let transport = ExternalTransport;
        assert!(transport.open(&SessionId::from("s1")).is_ok());
        assert!(transport.is_alive());
    }

    #[test]
    fn transport_error_displays_message() {
        let error = TransportError::new("socket closed");
        assert_eq!(error.to_string(), "socket closed");
    }
}
