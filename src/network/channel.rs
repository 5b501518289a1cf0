use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::events::RoomEvent;
use crate::error::Result;
use crate::models::{AdminGrant, ChatMessage, Participant, QueueItem, Room, VideoState};

/// Storage and fan-out for room data, shared by every session in a room.
///
/// All calls may fail with `Error::SyncChannelUnavailable`; callers treat
/// that as "skip this cycle".
#[async_trait]
pub trait SyncChannel: Send + Sync {
    async fn create_room(&self, video_url: &str) -> Result<Room>;

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>>;

    async fn update_room_video(&self, room_id: &str, video_url: &str) -> Result<()>;

    async fn add_participant(&self, room_id: &str, name: &str) -> Result<Participant>;

    async fn remove_participant(&self, room_id: &str, participant_id: &str) -> Result<()>;

    /// Participants in join order.
    async fn list_participants(&self, room_id: &str) -> Result<Vec<Participant>>;

    /// Returns `{0, false}` when nothing has been published yet.
    async fn get_video_state(&self, room_id: &str) -> Result<VideoState>;

    /// Overwrite the room's video state. The channel stamps `updated_at`.
    async fn set_video_state(
        &self,
        room_id: &str,
        position: f64,
        is_playing: bool,
    ) -> Result<VideoState>;

    async fn subscribe_video_state(&self, room_id: &str) -> Result<Subscription<VideoState>>;

    async fn subscribe_participants(&self, room_id: &str)
        -> Result<Subscription<Vec<Participant>>>;

    async fn send_event(&self, room_id: &str, event: RoomEvent) -> Result<()>;

    async fn subscribe_events(&self, room_id: &str) -> Result<Subscription<RoomEvent>>;

    async fn get_admin_grant(&self, room_id: &str) -> Result<Option<AdminGrant>>;

    async fn set_admin_grant(&self, room_id: &str, grant: AdminGrant) -> Result<()>;

    async fn load_queue(&self, room_id: &str) -> Result<Vec<QueueItem>>;

    async fn store_queue(&self, room_id: &str, items: &[QueueItem]) -> Result<()>;

    /// Store a chat line and fan it out. The channel assigns id and timestamp.
    async fn send_message(
        &self,
        room_id: &str,
        sender_name: &str,
        message: &str,
    ) -> Result<ChatMessage>;

    /// The most recent `limit` messages, oldest first.
    async fn get_messages(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;

    async fn subscribe_messages(&self, room_id: &str) -> Result<Subscription<ChatMessage>>;
}

/// Live feed of updates for one room topic
pub struct Subscription<T> {
    topic: &'static str,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    pub fn new(topic: &'static str, rx: broadcast::Receiver<T>) -> Self {
        Self { topic, rx }
    }

    /// Next update, or `None` once the feed is closed. Lagged updates are skipped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} subscription lagged, skipped {} updates", self.topic, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
