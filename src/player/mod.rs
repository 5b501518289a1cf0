pub mod backend;
pub mod events;
pub mod properties;

pub use backend::PlaybackEngine;
pub use events::{PlaybackErrorCode, PlayerEvent};
pub use properties::{
    validate_speed, PlaybackQuality, PlayerSnapshot, PlayerStatus, SUPPORTED_SPEEDS,
};
