use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Playback speeds the embedded player accepts
pub const SUPPORTED_SPEEDS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Player state as reported by the embed SDK
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    #[default]
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerStatus {
    /// Map the SDK's numeric state codes. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Point-in-time view of the local player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSnapshot {
    pub position: f64,
    pub duration: Option<f64>,
    pub status: PlayerStatus,
    pub speed: f64,
    pub volume: u8,
}

/// Quality preference forwarded to the player. Not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackQuality {
    #[default]
    Auto,
    Small,
    Medium,
    Large,
    Hd720,
    Hd1080,
    Highres,
}

impl PlaybackQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Hd720 => "hd720",
            Self::Hd1080 => "hd1080",
            Self::Highres => "highres",
        }
    }
}

impl fmt::Display for PlaybackQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackQuality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "default" => Ok(Self::Auto),
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            "hd720" => Ok(Self::Hd720),
            "hd1080" => Ok(Self::Hd1080),
            "highres" => Ok(Self::Highres),
            other => Err(format!("unknown quality: {}", other)),
        }
    }
}

pub fn validate_speed(speed: f64) -> Result<f64> {
    SUPPORTED_SPEEDS
        .iter()
        .copied()
        .find(|s| (s - speed).abs() < f64::EPSILON)
        .ok_or(Error::UnsupportedSpeed(speed))
}
