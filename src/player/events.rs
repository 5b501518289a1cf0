use std::fmt;

use super::properties::PlayerStatus;

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Player finished initializing
    Ready,
    /// Playback state changed
    StateChanged(PlayerStatus),
    /// The current video cannot be played
    Error(PlaybackErrorCode),
}

impl PlayerEvent {
    /// Build from the SDK's numeric state code.
    pub fn from_state_code(code: i32) -> Option<Self> {
        PlayerStatus::from_code(code).map(Self::StateChanged)
    }

    pub fn from_error_code(code: i32) -> Self {
        Self::Error(PlaybackErrorCode::from_code(code))
    }
}

/// Error codes reported by the embed SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackErrorCode {
    /// Malformed video id
    InvalidParameter,
    /// Content cannot be played in the HTML5 player
    Html5,
    /// Removed or private
    NotFound,
    /// Owner disallows embedded playback (101 or 150)
    EmbeddingDisallowed(i32),
    Unknown(i32),
}

impl PlaybackErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            2 => Self::InvalidParameter,
            5 => Self::Html5,
            100 => Self::NotFound,
            101 | 150 => Self::EmbeddingDisallowed(code),
            _ => Self::Unknown(code),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::InvalidParameter => 2,
            Self::Html5 => 5,
            Self::NotFound => 100,
            Self::EmbeddingDisallowed(code) | Self::Unknown(code) => code,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidParameter => "Invalid video ID",
            Self::Html5 => "Video cannot be played in HTML5 player",
            Self::NotFound => "Video not found or private",
            Self::EmbeddingDisallowed(_) => "Video owner does not allow embedding",
            Self::Unknown(_) => "Unknown playback error",
        }
    }
}

impl fmt::Display for PlaybackErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}
