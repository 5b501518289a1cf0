use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::channel::{Subscription, SyncChannel};
use super::events::RoomEvent;
use crate::error::{Error, Result};
use crate::models::{
    AdminGrant, ChatMessage, Participant, QueueItem, Room, RoomId, VideoState,
};
use crate::utils::generate_room_id;

const FANOUT_CAPACITY: usize = 64;

struct RoomRecord {
    room: Room,
    participants: Vec<Participant>,
    video_state: Option<VideoState>,
    video_state_writes: Vec<VideoState>,
    admin_grant: Option<AdminGrant>,
    queue: Vec<QueueItem>,
    messages: Vec<ChatMessage>,
    video_state_tx: broadcast::Sender<VideoState>,
    participants_tx: broadcast::Sender<Vec<Participant>>,
    events_tx: broadcast::Sender<RoomEvent>,
    messages_tx: broadcast::Sender<ChatMessage>,
}

impl RoomRecord {
    fn new(room: Room) -> Self {
        Self {
            room,
            participants: Vec::new(),
            video_state: None,
            video_state_writes: Vec::new(),
            admin_grant: None,
            queue: Vec::new(),
            messages: Vec::new(),
            video_state_tx: broadcast::channel(FANOUT_CAPACITY).0,
            participants_tx: broadcast::channel(FANOUT_CAPACITY).0,
            events_tx: broadcast::channel(FANOUT_CAPACITY).0,
            messages_tx: broadcast::channel(FANOUT_CAPACITY).0,
        }
    }

    fn publish_participants(&self) {
        // No receivers is fine
        let _ = self.participants_tx.send(self.participants.clone());
    }
}

/// In-process sync channel.
///
/// Every session sharing one instance sees the same rooms, which makes it
/// usable for local rooms and for exercising multi-session flows.
pub struct InMemoryChannel {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    next_participant: AtomicU64,
    next_message: AtomicU64,
    available: AtomicBool,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_participant: AtomicU64::new(1),
            next_message: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn create_room_with_id(&self, room_id: &str, video_url: &str) -> Result<Room> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write();
        if rooms.contains_key(room_id) {
            return Err(Error::RoomAlreadyExists(room_id.to_string()));
        }
        let room = Room {
            id: room_id.to_string(),
            video_url: video_url.to_string(),
            created_at: Utc::now(),
        };
        rooms.insert(room.id.clone(), RoomRecord::new(room.clone()));
        info!("Created room {}", room.id);
        Ok(room)
    }

    /// Every video state write accepted for the room, oldest first.
    pub fn video_state_writes(&self, room_id: &str) -> Vec<VideoState> {
        self.rooms
            .read()
            .get(room_id)
            .map(|record| record.video_state_writes.clone())
            .unwrap_or_default()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::SyncChannelUnavailable("backend offline".to_string()))
        }
    }

    fn read_room<T>(&self, room_id: &str, f: impl FnOnce(&RoomRecord) -> T) -> Result<T> {
        self.ensure_available()?;
        let rooms = self.rooms.read();
        let record = rooms
            .get(room_id)
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;
        Ok(f(record))
    }

    fn write_room<T>(&self, room_id: &str, f: impl FnOnce(&mut RoomRecord) -> T) -> Result<T> {
        self.ensure_available()?;
        let mut rooms = self.rooms.write();
        let record = rooms
            .get_mut(room_id)
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;
        Ok(f(record))
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncChannel for InMemoryChannel {
    async fn create_room(&self, video_url: &str) -> Result<Room> {
        loop {
            match self.create_room_with_id(&generate_room_id(), video_url) {
                Err(Error::RoomAlreadyExists(room_id)) => {
                    debug!("Room id {} taken, drawing another", room_id);
                }
                result => return result,
            }
        }
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        self.ensure_available()?;
        Ok(self
            .rooms
            .read()
            .get(room_id)
            .map(|record| record.room.clone()))
    }

    async fn update_room_video(&self, room_id: &str, video_url: &str) -> Result<()> {
        self.write_room(room_id, |record| {
            record.room.video_url = video_url.to_string();
        })?;
        debug!("Room {} video is now {}", room_id, video_url);
        Ok(())
    }

    async fn add_participant(&self, room_id: &str, name: &str) -> Result<Participant> {
        let id = format!("p{}", self.next_participant.fetch_add(1, Ordering::SeqCst));
        self.write_room(room_id, |record| {
            let participant = Participant {
                id,
                room_id: room_id.to_string(),
                name: name.to_string(),
                joined_at: Utc::now(),
            };
            record.participants.push(participant.clone());
            record.publish_participants();
            participant
        })
    }

    async fn remove_participant(&self, room_id: &str, participant_id: &str) -> Result<()> {
        self.write_room(room_id, |record| {
            let before = record.participants.len();
            record.participants.retain(|p| p.id != participant_id);
            if record.participants.len() != before {
                record.publish_participants();
            }
        })
    }

    async fn list_participants(&self, room_id: &str) -> Result<Vec<Participant>> {
        self.read_room(room_id, |record| record.participants.clone())
    }

    async fn get_video_state(&self, room_id: &str) -> Result<VideoState> {
        self.read_room(room_id, |record| {
            record.video_state.clone().unwrap_or_default()
        })
    }

    async fn set_video_state(
        &self,
        room_id: &str,
        position: f64,
        is_playing: bool,
    ) -> Result<VideoState> {
        self.write_room(room_id, |record| {
            let state = VideoState::new(position, is_playing);
            record.video_state = Some(state.clone());
            record.video_state_writes.push(state.clone());
            let _ = record.video_state_tx.send(state.clone());
            state
        })
    }

    async fn subscribe_video_state(&self, room_id: &str) -> Result<Subscription<VideoState>> {
        self.read_room(room_id, |record| {
            Subscription::new("video_state", record.video_state_tx.subscribe())
        })
    }

    async fn subscribe_participants(
        &self,
        room_id: &str,
    ) -> Result<Subscription<Vec<Participant>>> {
        self.read_room(room_id, |record| {
            Subscription::new("participants", record.participants_tx.subscribe())
        })
    }

    async fn send_event(&self, room_id: &str, event: RoomEvent) -> Result<()> {
        self.read_room(room_id, |record| {
            debug!("Room {} event: {}", room_id, event.kind());
            let _ = record.events_tx.send(event);
        })
    }

    async fn subscribe_events(&self, room_id: &str) -> Result<Subscription<RoomEvent>> {
        self.read_room(room_id, |record| {
            Subscription::new("events", record.events_tx.subscribe())
        })
    }

    async fn get_admin_grant(&self, room_id: &str) -> Result<Option<AdminGrant>> {
        self.read_room(room_id, |record| record.admin_grant.clone())
    }

    async fn set_admin_grant(&self, room_id: &str, grant: AdminGrant) -> Result<()> {
        self.write_room(room_id, |record| {
            record.admin_grant = Some(grant);
        })
    }

    async fn load_queue(&self, room_id: &str) -> Result<Vec<QueueItem>> {
        self.read_room(room_id, |record| record.queue.clone())
    }

    async fn store_queue(&self, room_id: &str, items: &[QueueItem]) -> Result<()> {
        self.write_room(room_id, |record| {
            record.queue = items.to_vec();
        })
    }

    async fn send_message(
        &self,
        room_id: &str,
        sender_name: &str,
        message: &str,
    ) -> Result<ChatMessage> {
        let id = format!("m{}", self.next_message.fetch_add(1, Ordering::SeqCst));
        self.write_room(room_id, |record| {
            let chat = ChatMessage {
                id,
                room_id: room_id.to_string(),
                sender_name: sender_name.to_string(),
                message: message.to_string(),
                created_at: Utc::now(),
            };
            record.messages.push(chat.clone());
            let _ = record.messages_tx.send(chat.clone());
            chat
        })
    }

    async fn get_messages(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        self.read_room(room_id, |record| {
            let skip = record.messages.len().saturating_sub(limit);
            record.messages[skip..].to_vec()
        })
    }

    async fn subscribe_messages(&self, room_id: &str) -> Result<Subscription<ChatMessage>> {
        self.read_room(room_id, |record| {
            Subscription::new("messages", record.messages_tx.subscribe())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_room() {
        let channel = InMemoryChannel::new();
        let room = channel
            .create_room("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(room.id.len(), 6);
        let fetched = channel.get_room(&room.id).await.unwrap().unwrap();
        assert_eq!(fetched, room);
        assert!(channel.get_room("NOPE00").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_video_state() {
        let channel = InMemoryChannel::new();
        channel.create_room_with_id("ABC123", "url").unwrap();
        let state = channel.get_video_state("ABC123").await.unwrap();
        assert_eq!(state.position, 0.0);
        assert!(!state.is_playing);
    }

    #[tokio::test]
    async fn test_video_state_fanout() {
        let channel = InMemoryChannel::new();
        channel.create_room_with_id("ABC123", "url").unwrap();
        let mut sub = channel.subscribe_video_state("ABC123").await.unwrap();

        channel.set_video_state("ABC123", 42.0, true).await.unwrap();
        let update = sub.recv().await.unwrap();
        assert_eq!(update.position, 42.0);
        assert!(update.is_playing);
        assert_eq!(channel.video_state_writes("ABC123").len(), 1);
    }

    #[tokio::test]
    async fn test_participants_in_join_order() {
        let channel = InMemoryChannel::new();
        channel.create_room_with_id("ABC123", "url").unwrap();
        let mut sub = channel.subscribe_participants("ABC123").await.unwrap();

        let alice = channel.add_participant("ABC123", "Alice").await.unwrap();
        let bob = channel.add_participant("ABC123", "Bob").await.unwrap();
        assert_eq!(sub.recv().await.unwrap().len(), 1);
        assert_eq!(sub.recv().await.unwrap().len(), 2);

        let names: Vec<_> = channel
            .list_participants("ABC123")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);

        channel.remove_participant("ABC123", &alice.id).await.unwrap();
        let remaining = sub.recv().await.unwrap();
        assert_eq!(remaining, vec![bob]);
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let channel = InMemoryChannel::new();
        channel.create_room_with_id("ABC123", "url").unwrap();
        channel.set_available(false);

        let err = channel.set_video_state("ABC123", 1.0, true).await.unwrap_err();
        assert!(err.is_transient());
        assert!(channel.video_state_writes("ABC123").is_empty());

        channel.set_available(true);
        assert!(channel.set_video_state("ABC123", 1.0, true).await.is_ok());
    }

    #[test]
    fn test_duplicate_room_id_is_permanent() {
        let channel = InMemoryChannel::new();
        channel.create_room_with_id("ABC123", "url").unwrap();
        let err = channel.create_room_with_id("ABC123", "other").unwrap_err();
        assert!(matches!(err, Error::RoomAlreadyExists(ref id) if id == "ABC123"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_duplicate_room_id_is_not_retried() {
        let channel = InMemoryChannel::new();
        channel.create_room_with_id("ABC123", "url").unwrap();
        let mut attempts = 0;
        let err = crate::utils::retry_transient(
            "room creation",
            3,
            std::time::Duration::ZERO,
            || {
                attempts += 1;
                std::future::ready(channel.create_room_with_id("ABC123", "url"))
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::RoomAlreadyExists(_)));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_message_history_keeps_latest() {
        let channel = InMemoryChannel::new();
        channel.create_room_with_id("ABC123", "url").unwrap();
        let mut sub = channel.subscribe_messages("ABC123").await.unwrap();
        for text in ["one", "two", "three"] {
            channel.send_message("ABC123", "Alice", text).await.unwrap();
        }
        assert_eq!(sub.recv().await.unwrap().message, "one");

        let history: Vec<_> = channel
            .get_messages("ABC123", 2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(history, vec!["two", "three"]);
        assert_eq!(channel.get_messages("ABC123", 50).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let channel = InMemoryChannel::new();
        let err = channel.list_participants("NOPE00").await.unwrap_err();
        assert!(matches!(err, Error::RoomNotFound(_)));
    }
}
