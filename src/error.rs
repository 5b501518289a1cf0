use thiserror::Error;

use crate::client::gate::GatedAction;
use crate::models::{ParticipantId, RoomId};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid video reference: {0}")]
    InvalidVideoReference(String),

    #[error("Only the room admin can {}", .0.description())]
    PermissionDenied(GatedAction),

    #[error("Participant {0} is not the room admin")]
    NotAuthorized(ParticipantId),

    #[error("Sync channel unavailable: {0}")]
    SyncChannelUnavailable(String),

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Room already exists: {0}")]
    RoomAlreadyExists(RoomId),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Playback engine error: {0}")]
    Engine(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Message is too long ({0} characters, max {1})")]
    MessageTooLong(usize, usize),

    #[error("Sending messages too fast")]
    ChatRateLimited,

    #[error("Unsupported playback speed: {0}")]
    UnsupportedSpeed(f64),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::SyncChannelUnavailable(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Engine(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_channel_errors_are_transient() {
        assert!(Error::SyncChannelUnavailable("timeout".into()).is_transient());
        assert!(!Error::RoomNotFound("ABC123".into()).is_transient());
        assert!(!Error::RoomAlreadyExists("ABC123".into()).is_transient());
        assert!(!Error::PermissionDenied(GatedAction::Play).is_transient());
    }

    #[test]
    fn test_permission_denied_message() {
        let err = Error::PermissionDenied(GatedAction::QueueAdd);
        assert_eq!(err.to_string(), "Only the room admin can add videos to queue");
    }

    #[test]
    fn test_engine_error_from_anyhow() {
        let err: Error = anyhow::anyhow!("player gone").into();
        assert!(matches!(err, Error::Engine(ref msg) if msg == "player gone"));
    }
}
