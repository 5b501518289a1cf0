// Playback command handlers

use crate::client::{GatedAction, PublishOutcome};
use crate::error::{Error, Result};
use crate::models::sanitize_position;
use crate::player::{validate_speed, PlaybackQuality};
use crate::session::{SessionEvent, WatchSession};

impl WatchSession {
    pub async fn play(&self) -> Result<()> {
        let engine = &self.inner.engine;
        self.inner
            .gate
            .invoke(GatedAction::Play, (), |_| async move {
                engine.play().await.map_err(Error::from)
            })
            .await
    }

    pub async fn pause(&self) -> Result<()> {
        let engine = &self.inner.engine;
        self.inner
            .gate
            .invoke(GatedAction::Pause, (), |_| async move {
                engine.pause().await.map_err(Error::from)
            })
            .await
    }

    /// Seek to `position`, clamped to the video's bounds.
    pub async fn seek(&self, position: f64) -> Result<()> {
        let engine = &self.inner.engine;
        self.inner
            .gate
            .invoke(GatedAction::Seek, position, |position| async move {
                let mut target = sanitize_position(position);
                if let Some(duration) = engine.duration().filter(|d| *d > 0.0) {
                    target = target.min(duration);
                }
                engine.seek(target).await.map_err(Error::from)
            })
            .await
    }

    pub async fn set_speed(&self, speed: f64) -> Result<()> {
        let inner = &self.inner;
        inner
            .gate
            .invoke(GatedAction::ChangeSpeed, speed, |speed| async move {
                let speed = validate_speed(speed)?;
                inner.engine.set_speed(speed).await?;
                inner.state.set_speed(speed);
                Ok::<_, Error>(())
            })
            .await
    }

    pub async fn set_quality(&self, quality: PlaybackQuality) -> Result<()> {
        let inner = &self.inner;
        inner
            .gate
            .invoke(GatedAction::ChangeQuality, quality, |quality| async move {
                inner.engine.set_quality(quality).await?;
                inner.state.set_quality(quality);
                Ok::<_, Error>(())
            })
            .await
    }

    pub async fn toggle_fullscreen(&self) -> Result<()> {
        let engine = &self.inner.engine;
        self.inner
            .gate
            .invoke(GatedAction::ToggleFullscreen, (), |_| async move {
                engine.toggle_fullscreen().await.map_err(Error::from)
            })
            .await
    }

    /// Local volume, 0 to 100. Not shared with the room, so not gated.
    pub async fn set_volume(&self, volume: u8) -> Result<()> {
        let volume = volume.min(100);
        self.inner.engine.set_volume(volume).await?;
        self.inner.state.set_volume(volume);
        Ok(())
    }

    /// Push the current playback state to everyone now, ignoring the throttle.
    pub async fn sync_now(&self) -> Result<()> {
        let inner = &self.inner;
        inner
            .gate
            .invoke(GatedAction::SyncNow, (), |_| async move {
                match inner.reconciler.sync_now().await {
                    PublishOutcome::Published => {
                        inner.emit(SessionEvent::Synced);
                        Ok(())
                    }
                    PublishOutcome::Failed => Err(Error::SyncChannelUnavailable(
                        "failed to publish video state".to_string(),
                    )),
                    _ => Ok(()),
                }
            })
            .await
    }
}
