use parking_lot::RwLock;
use std::sync::Arc;

use crate::models::VideoRef;
use crate::player::PlaybackQuality;

/// Video currently loaded in the local player
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentVideo {
    pub url: String,
    pub video_id: String,
    pub title: Option<String>,
}

impl From<VideoRef> for CurrentVideo {
    fn from(video: VideoRef) -> Self {
        Self {
            url: video.url,
            video_id: video.video_id,
            title: None,
        }
    }
}

/// Local, per-session view of the room
pub struct ClientState {
    /// Display name used on join
    display_name: RwLock<String>,
    current_video: RwLock<Option<CurrentVideo>>,
    /// Last unrecoverable playback error, cleared on the next successful load
    last_error: RwLock<Option<String>>,
    speed: RwLock<f64>,
    quality: RwLock<PlaybackQuality>,
    volume: RwLock<u8>,
}

impl ClientState {
    pub fn new(display_name: String) -> Arc<Self> {
        Arc::new(Self {
            display_name: RwLock::new(display_name),
            current_video: RwLock::new(None),
            last_error: RwLock::new(None),
            speed: RwLock::new(1.0),
            quality: RwLock::new(PlaybackQuality::Auto),
            volume: RwLock::new(100),
        })
    }

    pub fn get_display_name(&self) -> String {
        self.display_name.read().clone()
    }

    // Video methods
    pub fn get_current_video(&self) -> Option<CurrentVideo> {
        self.current_video.read().clone()
    }

    pub fn set_current_video(&self, video: CurrentVideo) {
        *self.current_video.write() = Some(video);
        *self.last_error.write() = None;
    }

    pub fn get_last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn set_last_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    // Preference methods
    pub fn get_speed(&self) -> f64 {
        *self.speed.read()
    }

    pub fn set_speed(&self, speed: f64) {
        *self.speed.write() = speed;
    }

    pub fn get_quality(&self) -> PlaybackQuality {
        *self.quality.read()
    }

    pub fn set_quality(&self, quality: PlaybackQuality) {
        *self.quality.write() = quality;
    }

    pub fn get_volume(&self) -> u8 {
        *self.volume.read()
    }

    pub fn set_volume(&self, volume: u8) {
        *self.volume.write() = volume;
    }
}
