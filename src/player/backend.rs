use async_trait::async_trait;

use super::properties::{PlaybackQuality, PlayerSnapshot, PlayerStatus};

/// Adapter over the embedded video player.
///
/// Commands are async and fallible; state reads are synchronous snapshots of
/// the last known player state.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn snapshot(&self) -> PlayerSnapshot;

    fn current_time(&self) -> f64 {
        self.snapshot().position
    }

    fn duration(&self) -> Option<f64> {
        self.snapshot().duration
    }

    fn status(&self) -> PlayerStatus {
        self.snapshot().status
    }

    async fn load(&self, video_id: &str) -> anyhow::Result<()>;

    async fn play(&self) -> anyhow::Result<()>;

    async fn pause(&self) -> anyhow::Result<()>;

    async fn seek(&self, position: f64) -> anyhow::Result<()>;

    async fn set_speed(&self, speed: f64) -> anyhow::Result<()>;

    async fn set_quality(&self, quality: PlaybackQuality) -> anyhow::Result<()>;

    async fn set_volume(&self, volume: u8) -> anyhow::Result<()>;

    async fn toggle_fullscreen(&self) -> anyhow::Result<()>;
}
