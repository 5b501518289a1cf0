use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::publisher::{PublishOutcome, Publisher};
use super::subscriber::Subscriber;
use super::sync::SyncEngine;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::models::{Role, RoomId};
use crate::network::SyncChannel;
use crate::player::{PlaybackEngine, PlaybackErrorCode, PlayerEvent, PlayerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerMode {
    Uninitialized,
    Publisher,
    Subscriber,
}

enum ModeState {
    Uninitialized,
    Publisher(Publisher),
    Subscriber(Subscriber),
}

impl ModeState {
    fn mode(&self) -> ReconcilerMode {
        match self {
            Self::Uninitialized => ReconcilerMode::Uninitialized,
            Self::Publisher(_) => ReconcilerMode::Publisher,
            Self::Subscriber(_) => ReconcilerMode::Subscriber,
        }
    }

    fn teardown(&mut self) {
        match std::mem::replace(self, Self::Uninitialized) {
            Self::Publisher(publisher) => publisher.shutdown(),
            Self::Subscriber(subscriber) => subscriber.stop(),
            Self::Uninitialized => {}
        }
    }
}

/// Follow-up the caller must perform after a player event
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilerOutcome {
    None,
    /// Advance the queue once `delay` has elapsed
    AdvanceQueue { delay: Duration },
    /// Nothing left to fall back to; show the error
    PlaybackFailed(PlaybackErrorCode),
}

/// Switches between publishing and following playback state as the local
/// role changes.
pub struct Reconciler {
    room_id: RoomId,
    channel: Arc<dyn SyncChannel>,
    engine: Arc<dyn PlaybackEngine>,
    config: SessionConfig,
    state: Mutex<ModeState>,
}

impl Reconciler {
    pub fn new(
        room_id: RoomId,
        channel: Arc<dyn SyncChannel>,
        engine: Arc<dyn PlaybackEngine>,
        config: SessionConfig,
    ) -> Self {
        Self {
            room_id,
            channel,
            engine,
            config,
            state: Mutex::new(ModeState::Uninitialized),
        }
    }

    pub async fn mode(&self) -> ReconcilerMode {
        self.state.lock().await.mode()
    }

    /// Rewire for `role`. Returns whether the mode changed.
    ///
    /// A failed subscribe leaves the reconciler uninitialized so the next
    /// role evaluation retries.
    pub async fn apply_role(&self, role: Role) -> Result<bool> {
        let mut state = self.state.lock().await;
        match (role, state.mode()) {
            (Role::Admin, ReconcilerMode::Publisher) => return Ok(false),
            (Role::Member, ReconcilerMode::Subscriber) => return Ok(false),
            _ => {}
        }
        state.teardown();

        match role {
            Role::Admin => {
                *state = ModeState::Publisher(Publisher::new(
                    self.room_id.clone(),
                    self.channel.clone(),
                    self.engine.clone(),
                    &self.config.sync,
                ));
                info!("Reconciler for room {} is now publishing", self.room_id);
            }
            Role::Member => {
                let subscription = self.channel.subscribe_video_state(&self.room_id).await?;
                let mut sync = SyncEngine::new();
                sync.update_from_config(&self.config.sync);
                let subscriber = Subscriber::spawn(subscription, self.engine.clone(), sync);

                match self.channel.get_video_state(&self.room_id).await {
                    Ok(current) => {
                        subscriber.apply(&current).await;
                    }
                    Err(e) => warn!("Failed to fetch video state: {}", e),
                }
                *state = ModeState::Subscriber(subscriber);
                info!("Reconciler for room {} is now following", self.room_id);
            }
        }
        Ok(true)
    }

    /// Handle a player event. `queue_pending` tells whether the queue has
    /// anything to fall back to.
    pub async fn handle_player_event(
        &self,
        event: &PlayerEvent,
        queue_pending: bool,
    ) -> ReconcilerOutcome {
        let state = self.state.lock().await;
        let publisher = match &*state {
            ModeState::Publisher(publisher) => Some(publisher),
            _ => None,
        };

        match event {
            PlayerEvent::StateChanged(status @ (PlayerStatus::Playing | PlayerStatus::Paused)) => {
                if let Some(publisher) = publisher {
                    publisher.on_state_change(*status).await;
                }
                ReconcilerOutcome::None
            }
            PlayerEvent::StateChanged(PlayerStatus::Ended) => {
                if publisher.is_some() && queue_pending {
                    ReconcilerOutcome::AdvanceQueue {
                        delay: self.config.queue.ended_advance_delay(),
                    }
                } else {
                    ReconcilerOutcome::None
                }
            }
            PlayerEvent::Error(code) => {
                warn!("Playback error in room {}: {}", self.room_id, code);
                if publisher.is_some() && queue_pending {
                    ReconcilerOutcome::AdvanceQueue {
                        delay: self.config.queue.error_advance_delay(),
                    }
                } else {
                    ReconcilerOutcome::PlaybackFailed(*code)
                }
            }
            PlayerEvent::StateChanged(_) | PlayerEvent::Ready => ReconcilerOutcome::None,
        }
    }

    /// Re-align a following player with the room's current state, e.g. after
    /// a load reset it. A no-op unless following.
    pub async fn resync(&self) -> Result<()> {
        let state = self.state.lock().await;
        if let ModeState::Subscriber(subscriber) = &*state {
            let current = self.channel.get_video_state(&self.room_id).await?;
            let actions = subscriber.apply(&current).await;
            debug!("Resynced room {}: {:?}", self.room_id, actions);
        }
        Ok(())
    }

    /// Force-publish the current player state. A no-op unless publishing.
    pub async fn sync_now(&self) -> PublishOutcome {
        match &*self.state.lock().await {
            ModeState::Publisher(publisher) => publisher.force_publish().await,
            _ => {
                debug!("sync_now ignored, not publishing");
                PublishOutcome::Skipped
            }
        }
    }

    pub async fn shutdown(&self) {
        self.state.lock().await.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::InMemoryChannel;
    use crate::testing::{EngineCall, RecordingEngine};

    const ROOM: &str = "ABC123";

    fn setup() -> (Arc<InMemoryChannel>, Arc<RecordingEngine>, Reconciler) {
        let channel = Arc::new(InMemoryChannel::new());
        channel.create_room_with_id(ROOM, "url").unwrap();
        let engine = RecordingEngine::new();
        let reconciler = Reconciler::new(
            ROOM.to_string(),
            channel.clone(),
            engine.clone(),
            SessionConfig::default(),
        );
        (channel, engine, reconciler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_role_is_idempotent() {
        let (_channel, _engine, reconciler) = setup();
        assert_eq!(reconciler.mode().await, ReconcilerMode::Uninitialized);
        assert!(reconciler.apply_role(Role::Admin).await.unwrap());
        assert!(!reconciler.apply_role(Role::Admin).await.unwrap());
        assert_eq!(reconciler.mode().await, ReconcilerMode::Publisher);
        assert!(reconciler.apply_role(Role::Member).await.unwrap());
        assert_eq!(reconciler.mode().await, ReconcilerMode::Subscriber);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_aligns_on_entry() {
        let (channel, engine, reconciler) = setup();
        channel.set_video_state(ROOM, 120.0, true).await.unwrap();
        reconciler.apply_role(Role::Member).await.unwrap();
        assert_eq!(engine.calls(), vec![EngineCall::Seek(120.0), EngineCall::Play]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_reapplies_current_state() {
        let (channel, engine, reconciler) = setup();
        reconciler.apply_role(Role::Member).await.unwrap();
        channel.set_video_state(ROOM, 40.0, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.snapshot().status, PlayerStatus::Playing);

        engine.load("9bZkp7q19f0").await.unwrap();
        engine.clear_calls();
        reconciler.resync().await.unwrap();
        assert_eq!(engine.calls(), vec![EngineCall::Seek(40.0), EngineCall::Play]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_ignored_while_publishing() {
        let (channel, engine, reconciler) = setup();
        reconciler.apply_role(Role::Admin).await.unwrap();
        channel.set_video_state(ROOM, 40.0, true).await.unwrap();
        reconciler.resync().await.unwrap();
        assert!(engine.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_never_publishes() {
        let (channel, engine, reconciler) = setup();
        reconciler.apply_role(Role::Member).await.unwrap();
        engine.set_status(PlayerStatus::Playing);
        reconciler
            .handle_player_event(&PlayerEvent::StateChanged(PlayerStatus::Playing), true)
            .await;
        assert_eq!(reconciler.sync_now().await, PublishOutcome::Skipped);
        assert!(channel.video_state_writes(ROOM).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_demotion_stops_pending_publish() {
        let (channel, engine, reconciler) = setup();
        reconciler.apply_role(Role::Admin).await.unwrap();
        engine.set_status(PlayerStatus::Playing);
        reconciler
            .handle_player_event(&PlayerEvent::StateChanged(PlayerStatus::Playing), false)
            .await;
        engine.set_position(1.0);
        reconciler
            .handle_player_event(&PlayerEvent::StateChanged(PlayerStatus::Paused), false)
            .await;

        reconciler.apply_role(Role::Member).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(channel.video_state_writes(ROOM).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_advances_only_with_queue() {
        let (_channel, _engine, reconciler) = setup();
        reconciler.apply_role(Role::Admin).await.unwrap();
        let ended = PlayerEvent::StateChanged(PlayerStatus::Ended);
        assert_eq!(
            reconciler.handle_player_event(&ended, true).await,
            ReconcilerOutcome::AdvanceQueue {
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            reconciler.handle_player_event(&ended, false).await,
            ReconcilerOutcome::None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_error_falls_back_to_queue() {
        let (_channel, _engine, reconciler) = setup();
        reconciler.apply_role(Role::Admin).await.unwrap();
        let error = PlayerEvent::Error(PlaybackErrorCode::NotFound);
        assert_eq!(
            reconciler.handle_player_event(&error, true).await,
            ReconcilerOutcome::AdvanceQueue {
                delay: Duration::from_secs(3)
            }
        );
        assert_eq!(
            reconciler.handle_player_event(&error, false).await,
            ReconcilerOutcome::PlaybackFailed(PlaybackErrorCode::NotFound)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscribe_leaves_uninitialized() {
        let (channel, _engine, reconciler) = setup();
        reconciler.apply_role(Role::Admin).await.unwrap();
        channel.set_available(false);
        assert!(reconciler.apply_role(Role::Member).await.is_err());
        assert_eq!(reconciler.mode().await, ReconcilerMode::Uninitialized);

        channel.set_available(true);
        assert!(reconciler.apply_role(Role::Member).await.unwrap());
        assert_eq!(reconciler.mode().await, ReconcilerMode::Subscriber);
    }
}
