//! Error types for a3s-room

use thiserror::Error;

/// Errors reported by the transport/media engine
///
/// These are the values carried by `ConnectionState::Disconnected` and
/// `ConnectionState::Connecting`, so they must stay cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Transport connection failure (ICE, DTLS, socket)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Signaling channel failure
    #[error("Signal error: {0}")]
    Signal(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Operation cancelled by the client
    #[error("Cancelled")]
    Cancelled,

    /// Server asked the client to leave
    #[error("Server requested leave: {0}")]
    ServerLeave(String),
}

/// Errors that can occur in the room core
#[derive(Debug, Error)]
pub enum RoomError {
    /// Engine collaborator failure
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Participant is registered but has no publication for the track yet
    #[error("Publication '{track_sid}' not found for participant '{participant_sid}'")]
    PublicationNotFound {
        participant_sid: String,
        track_sid: String,
    },

    /// Stream id could not be split into participant/track parts
    #[error("Invalid stream id: {0}")]
    InvalidStreamId(String),

    /// Event loop already running
    #[error("Room already started")]
    AlreadyStarted,

    /// Room already closed
    #[error("Room already closed")]
    AlreadyClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The room's event loop failed
    #[error("Room failure: {0}")]
    Internal(String),
}

impl RoomError {
    /// Whether retrying the same operation later may succeed
    ///
    /// Only a missing publication is transient: its metadata arrives through
    /// a separate participant update.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoomError::PublicationNotFound { .. })
    }
}

/// Result type alias for room operations
pub type Result<T> = std::result::Result<T, RoomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_publication_is_retryable() {
        let missing = RoomError::PublicationNotFound {
            participant_sid: "PA_1".to_string(),
            track_sid: "TR_1".to_string(),
        };
        assert!(missing.is_retryable());
        assert!(!RoomError::InvalidStreamId("PA_1".to_string()).is_retryable());
        assert!(!RoomError::Engine(EngineError::Cancelled).is_retryable());
        assert!(!RoomError::AlreadyClosed.is_retryable());
    }

    #[test]
    fn test_engine_error_converts() {
        let err: RoomError = EngineError::Timeout("join".to_string()).into();
        assert!(matches!(err, RoomError::Engine(EngineError::Timeout(_))));
        assert_eq!(err.to_string(), "Engine error: Operation timed out: join");
    }

    #[test]
    fn test_publication_not_found_message() {
        let err = RoomError::PublicationNotFound {
            participant_sid: "PA_a".to_string(),
            track_sid: "TR_b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Publication 'TR_b' not found for participant 'PA_a'"
        );
    }
}
