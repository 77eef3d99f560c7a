use super::state::SessionId;
use super::transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not initialized")]
    NotInitialized,

    #[error("Maximum reconnect attempts exceeded ({attempts})")]
    MaxReconnectAttemptsExceeded { attempts: u32 },

    #[error("Connection failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Session already active: {0}")]
    AlreadyActive(SessionId),

    #[error("Session id must not be empty")]
    InvalidSessionId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_attempts_displays_ceiling() {
        let error = SessionError::MaxReconnectAttemptsExceeded { attempts: 3 };
        assert!(error.to_string().contains('3'));
    }

    #[test]
    fn transport_error_converts() {
        let error: SessionError = TransportError::new("refused").into();
        assert_eq!(error, SessionError::Transport(TransportError::new("refused")));
        assert!(error.to_string().contains("refused"));
    }

    #[test]
    fn already_active_displays_session_id() {
        let error = SessionError::AlreadyActive(SessionId::from("live-1"));
        assert!(error.to_string().contains("live-1"));
    }
}
