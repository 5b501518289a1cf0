//! Test doubles shared across module tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::models::{AdminGrant, ChatMessage, Participant, QueueItem, Room, VideoState};
use crate::network::{InMemoryChannel, RoomEvent, Subscription, SyncChannel};
use crate::player::{PlaybackEngine, PlaybackQuality, PlayerSnapshot, PlayerStatus};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    SetSpeed(f64),
    SetQuality(PlaybackQuality),
    SetVolume(u8),
    ToggleFullscreen,
}

/// Playback engine that records every command it receives.
pub(crate) struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    snapshot: Mutex<PlayerSnapshot>,
    failing_loads: Mutex<HashSet<String>>,
    load_delay: Mutex<Option<Duration>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            snapshot: Mutex::new(PlayerSnapshot {
                speed: 1.0,
                volume: 100,
                ..PlayerSnapshot::default()
            }),
            failing_loads: Mutex::new(HashSet::new()),
            load_delay: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Load(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Seek(position) => Some(*position),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn set_position(&self, position: f64) {
        self.snapshot.lock().position = position;
    }

    pub fn set_status(&self, status: PlayerStatus) {
        self.snapshot.lock().status = status;
    }

    pub fn fail_load(&self, video_id: &str) {
        self.failing_loads.lock().insert(video_id.to_string());
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock() = Some(delay);
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PlaybackEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.lock().clone()
    }

    async fn load(&self, video_id: &str) -> anyhow::Result<()> {
        self.record(EngineCall::Load(video_id.to_string()));
        let delay = *self.load_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_loads.lock().contains(video_id) {
            anyhow::bail!("video {} is unavailable", video_id);
        }
        let mut snapshot = self.snapshot.lock();
        snapshot.position = 0.0;
        snapshot.status = PlayerStatus::Unstarted;
        Ok(())
    }

    async fn play(&self) -> anyhow::Result<()> {
        self.record(EngineCall::Play);
        self.snapshot.lock().status = PlayerStatus::Playing;
        Ok(())
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.record(EngineCall::Pause);
        self.snapshot.lock().status = PlayerStatus::Paused;
        Ok(())
    }

    async fn seek(&self, position: f64) -> anyhow::Result<()> {
        self.record(EngineCall::Seek(position));
        self.snapshot.lock().position = position;
        Ok(())
    }

    async fn set_speed(&self, speed: f64) -> anyhow::Result<()> {
        self.record(EngineCall::SetSpeed(speed));
        self.snapshot.lock().speed = speed;
        Ok(())
    }

    async fn set_quality(&self, quality: PlaybackQuality) -> anyhow::Result<()> {
        self.record(EngineCall::SetQuality(quality));
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> anyhow::Result<()> {
        self.record(EngineCall::SetVolume(volume));
        self.snapshot.lock().volume = volume;
        Ok(())
    }

    async fn toggle_fullscreen(&self) -> anyhow::Result<()> {
        self.record(EngineCall::ToggleFullscreen);
        Ok(())
    }
}

/// In-memory channel with injected latency on selected calls.
///
/// Grant reads answer with the value current when the call started, like a
/// slow network round trip. State writes land after the delay.
pub(crate) struct SlowChannel {
    inner: Arc<InMemoryChannel>,
    grant_read_delay: Duration,
    state_write_delay: Duration,
}

impl SlowChannel {
    pub fn new(inner: Arc<InMemoryChannel>) -> Self {
        Self {
            inner,
            grant_read_delay: Duration::ZERO,
            state_write_delay: Duration::ZERO,
        }
    }

    pub fn with_grant_read_delay(mut self, delay: Duration) -> Self {
        self.grant_read_delay = delay;
        self
    }

    pub fn with_state_write_delay(mut self, delay: Duration) -> Self {
        self.state_write_delay = delay;
        self
    }
}

#[async_trait]
impl SyncChannel for SlowChannel {
    async fn create_room(&self, video_url: &str) -> Result<Room> {
        self.inner.create_room(video_url).await
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        self.inner.get_room(room_id).await
    }

    async fn update_room_video(&self, room_id: &str, video_url: &str) -> Result<()> {
        self.inner.update_room_video(room_id, video_url).await
    }

    async fn add_participant(&self, room_id: &str, name: &str) -> Result<Participant> {
        self.inner.add_participant(room_id, name).await
    }

    async fn remove_participant(&self, room_id: &str, participant_id: &str) -> Result<()> {
        self.inner.remove_participant(room_id, participant_id).await
    }

    async fn list_participants(&self, room_id: &str) -> Result<Vec<Participant>> {
        self.inner.list_participants(room_id).await
    }

    async fn get_video_state(&self, room_id: &str) -> Result<VideoState> {
        self.inner.get_video_state(room_id).await
    }

    async fn set_video_state(
        &self,
        room_id: &str,
        position: f64,
        is_playing: bool,
    ) -> Result<VideoState> {
        tokio::time::sleep(self.state_write_delay).await;
        self.inner.set_video_state(room_id, position, is_playing).await
    }

    async fn subscribe_video_state(&self, room_id: &str) -> Result<Subscription<VideoState>> {
        self.inner.subscribe_video_state(room_id).await
    }

    async fn subscribe_participants(
        &self,
        room_id: &str,
    ) -> Result<Subscription<Vec<Participant>>> {
        self.inner.subscribe_participants(room_id).await
    }

    async fn send_event(&self, room_id: &str, event: RoomEvent) -> Result<()> {
        self.inner.send_event(room_id, event).await
    }

    async fn subscribe_events(&self, room_id: &str) -> Result<Subscription<RoomEvent>> {
        self.inner.subscribe_events(room_id).await
    }

    async fn get_admin_grant(&self, room_id: &str) -> Result<Option<AdminGrant>> {
        let grant = self.inner.get_admin_grant(room_id).await?;
        tokio::time::sleep(self.grant_read_delay).await;
        Ok(grant)
    }

    async fn set_admin_grant(&self, room_id: &str, grant: AdminGrant) -> Result<()> {
        self.inner.set_admin_grant(room_id, grant).await
    }

    async fn load_queue(&self, room_id: &str) -> Result<Vec<QueueItem>> {
        self.inner.load_queue(room_id).await
    }

    async fn store_queue(&self, room_id: &str, items: &[QueueItem]) -> Result<()> {
        self.inner.store_queue(room_id, items).await
    }

    async fn send_message(
        &self,
        room_id: &str,
        sender_name: &str,
        message: &str,
    ) -> Result<ChatMessage> {
        self.inner.send_message(room_id, sender_name, message).await
    }

    async fn get_messages(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        self.inner.get_messages(room_id, limit).await
    }

    async fn subscribe_messages(&self, room_id: &str) -> Result<Subscription<ChatMessage>> {
        self.inner.subscribe_messages(room_id).await
    }
}
