use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::throttle::{Throttle, ThrottleDecision};
use crate::config::SyncSettings;
use crate::models::{RoomId, VideoState};
use crate::network::SyncChannel;
use crate::player::{PlaybackEngine, PlayerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Written to the sync channel
    Published,
    /// Held until the throttle window closes
    Deferred,
    /// Discarded by the throttle
    Dropped,
    /// Not a publishable change, or the publisher is shut down
    Skipped,
    /// The sync channel rejected the write
    Failed,
}

/// Admin side of the reconciler: local player changes to the sync channel.
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    room_id: RoomId,
    channel: Arc<dyn SyncChannel>,
    engine: Arc<dyn PlaybackEngine>,
    throttle: Mutex<Throttle<VideoState>>,
    trailing: Mutex<Option<JoinHandle<()>>>,
    write_lock: tokio::sync::Mutex<()>,
    active: AtomicBool,
}

impl Publisher {
    pub fn new(
        room_id: RoomId,
        channel: Arc<dyn SyncChannel>,
        engine: Arc<dyn PlaybackEngine>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                room_id,
                channel,
                engine,
                throttle: Mutex::new(Throttle::new(
                    settings.publish_window(),
                    settings.throttle_mode,
                )),
                trailing: Mutex::new(None),
                write_lock: tokio::sync::Mutex::new(()),
                active: AtomicBool::new(true),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// React to a player state change. Only play and pause are published.
    pub async fn on_state_change(&self, status: PlayerStatus) -> PublishOutcome {
        let is_playing = match status {
            PlayerStatus::Playing => true,
            PlayerStatus::Paused => false,
            _ => return PublishOutcome::Skipped,
        };
        let sample = VideoState::new(self.inner.engine.current_time(), is_playing);
        self.offer(sample).await
    }

    /// Submit a sampled state through the throttle.
    pub async fn offer(&self, state: VideoState) -> PublishOutcome {
        if !self.is_active() {
            return PublishOutcome::Skipped;
        }
        let decision = self.inner.throttle.lock().offer(state, Instant::now());
        match decision {
            ThrottleDecision::Fire(state) => self.inner.write(state).await,
            ThrottleDecision::Schedule(delay) => {
                debug!("Publish deferred by {:?}", delay);
                let inner = self.inner.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // Once flushing starts the write must run to completion,
                    // so take this task out of reach of the next schedule.
                    inner.trailing.lock().take();
                    inner.flush_pending().await;
                });
                if let Some(previous) = self.inner.trailing.lock().replace(handle) {
                    previous.abort();
                }
                PublishOutcome::Deferred
            }
            ThrottleDecision::Coalesced => PublishOutcome::Deferred,
            ThrottleDecision::Dropped => {
                debug!("Publish dropped inside throttle window");
                PublishOutcome::Dropped
            }
        }
    }

    /// Publish the player's current state now, ignoring the throttle.
    pub async fn force_publish(&self) -> PublishOutcome {
        if !self.is_active() {
            return PublishOutcome::Skipped;
        }
        self.inner.cancel_trailing();
        let snapshot = self.inner.engine.snapshot();
        let state = VideoState::new(snapshot.position, snapshot.status.is_playing());
        self.inner.throttle.lock().mark_fired(Instant::now());
        info!(
            "Force publishing {:.2}s ({})",
            state.position,
            if state.is_playing { "playing" } else { "paused" }
        );
        self.inner.write(state).await
    }

    /// Stop publishing. Pending trailing writes are cancelled; one already
    /// in flight finishes.
    pub fn shutdown(&self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.inner.cancel_trailing();
            self.inner.throttle.lock().reset();
            debug!("Publisher for room {} stopped", self.inner.room_id);
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PublisherInner {
    async fn flush_pending(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let pending = self.throttle.lock().flush(Instant::now());
        if let Some(state) = pending {
            self.write(state).await;
        }
    }

    async fn write(&self, state: VideoState) -> PublishOutcome {
        let _guard = self.write_lock.lock().await;
        if !self.active.load(Ordering::SeqCst) {
            return PublishOutcome::Skipped;
        }
        match self
            .channel
            .set_video_state(&self.room_id, state.position, state.is_playing)
            .await
        {
            Ok(_) => {
                debug!(
                    "Published {:.2}s ({}) to room {}",
                    state.position,
                    if state.is_playing { "playing" } else { "paused" },
                    self.room_id
                );
                PublishOutcome::Published
            }
            Err(e) => {
                warn!("Failed to publish video state: {}", e);
                PublishOutcome::Failed
            }
        }
    }

    fn cancel_trailing(&self) {
        if let Some(handle) = self.trailing.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleMode;
    use crate::network::InMemoryChannel;
    use crate::testing::{RecordingEngine, SlowChannel};
    use std::time::Duration;

    const ROOM: &str = "ABC123";

    fn setup(mode: ThrottleMode) -> (Arc<InMemoryChannel>, Arc<RecordingEngine>, Publisher) {
        let channel = Arc::new(InMemoryChannel::new());
        channel.create_room_with_id(ROOM, "url").unwrap();
        let engine = RecordingEngine::new();
        let settings = SyncSettings {
            throttle_mode: mode,
            ..SyncSettings::default()
        };
        let publisher = Publisher::new(ROOM.to_string(), channel.clone(), engine.clone(), &settings);
        (channel, engine, publisher)
    }

    async fn burst(engine: &RecordingEngine, publisher: &Publisher) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::new();
        engine.set_position(0.0);
        outcomes.push(publisher.on_state_change(PlayerStatus::Playing).await);
        tokio::time::sleep(Duration::from_millis(500)).await;
        engine.set_position(0.5);
        outcomes.push(publisher.on_state_change(PlayerStatus::Paused).await);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        engine.set_position(1.5);
        outcomes.push(publisher.on_state_change(PlayerStatus::Playing).await);
        outcomes
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_edge_publishes_first_only() {
        let (channel, engine, publisher) = setup(ThrottleMode::Leading);
        let outcomes = burst(&engine, &publisher).await;
        assert_eq!(
            outcomes,
            vec![
                PublishOutcome::Published,
                PublishOutcome::Dropped,
                PublishOutcome::Dropped
            ]
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        let writes = channel.video_state_writes(ROOM);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].position, 0.0);
        assert!(writes[0].is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_edge_publishes_latest_on_window_close() {
        let (channel, engine, publisher) = setup(ThrottleMode::Trailing);
        let outcomes = burst(&engine, &publisher).await;
        assert_eq!(
            outcomes,
            vec![
                PublishOutcome::Published,
                PublishOutcome::Deferred,
                PublishOutcome::Deferred
            ]
        );
        assert_eq!(channel.video_state_writes(ROOM).len(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let writes = channel.video_state_writes(ROOM);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].position, 1.5);
        assert!(writes[1].is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_publish() {
        let (channel, engine, publisher) = setup(ThrottleMode::Trailing);
        burst(&engine, &publisher).await;
        publisher.shutdown();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(channel.video_state_writes(ROOM).len(), 1);
        assert_eq!(
            publisher.on_state_change(PlayerStatus::Paused).await,
            PublishOutcome::Skipped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_publish_bypasses_throttle() {
        let (channel, engine, publisher) = setup(ThrottleMode::Trailing);
        publisher.on_state_change(PlayerStatus::Playing).await;
        engine.set_position(42.0);
        engine.set_status(PlayerStatus::Paused);
        publisher.on_state_change(PlayerStatus::Paused).await;

        assert_eq!(publisher.force_publish().await, PublishOutcome::Published);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let writes = channel.video_state_writes(ROOM);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].position, 42.0);
        assert!(!writes[1].is_playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_schedule_keeps_in_flight_flush() {
        let channel = Arc::new(InMemoryChannel::new());
        channel.create_room_with_id(ROOM, "url").unwrap();
        let slow = SlowChannel::new(channel.clone()).with_state_write_delay(Duration::from_secs(1));
        let publisher = Publisher::new(
            ROOM.to_string(),
            Arc::new(slow),
            RecordingEngine::new(),
            &SyncSettings::default(),
        );

        // Fires at t=0 and lands at t=1
        assert_eq!(
            publisher.offer(VideoState::new(0.0, true)).await,
            PublishOutcome::Published
        );
        // Flushed at t=2, lands at t=3
        assert_eq!(
            publisher.offer(VideoState::new(1.0, false)).await,
            PublishOutcome::Deferred
        );
        tokio::time::sleep(Duration::from_millis(1500)).await;
        // Scheduled while the flush above is still writing
        assert_eq!(
            publisher.offer(VideoState::new(2.5, true)).await,
            PublishOutcome::Deferred
        );
        tokio::time::sleep(Duration::from_secs(5)).await;

        let positions: Vec<_> = channel
            .video_state_writes(ROOM)
            .into_iter()
            .map(|state| state.position)
            .collect();
        assert_eq!(positions, vec![0.0, 1.0, 2.5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_failure_is_skipped() {
        let (channel, _engine, publisher) = setup(ThrottleMode::Leading);
        channel.set_available(false);
        assert_eq!(
            publisher.on_state_change(PlayerStatus::Playing).await,
            PublishOutcome::Failed
        );
        channel.set_available(true);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            publisher.on_state_change(PlayerStatus::Playing).await,
            PublishOutcome::Published
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_publishable_status_is_skipped() {
        let (channel, _engine, publisher) = setup(ThrottleMode::Trailing);
        assert_eq!(
            publisher.on_state_change(PlayerStatus::Buffering).await,
            PublishOutcome::Skipped
        );
        assert!(channel.video_state_writes(ROOM).is_empty());
    }
}
