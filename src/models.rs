use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RoomId = String;
pub type ParticipantId = String;
pub type QueueItemId = String;
pub type MessageId = String;

/// Room record as stored by the sync channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub video_url: String,
    pub created_at: DateTime<Utc>,
}

/// Participant record. The role is derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub room_id: RoomId,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Shared playback record, one per room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoState {
    pub position: f64,
    pub is_playing: bool,
    pub updated_at: DateTime<Utc>,
}

impl VideoState {
    pub fn new(position: f64, is_playing: bool) -> Self {
        Self {
            position: sanitize_position(position),
            is_playing,
            updated_at: Utc::now(),
        }
    }
}

impl Default for VideoState {
    fn default() -> Self {
        Self::new(0.0, false)
    }
}

/// Positions are non-negative; anything else collapses to the start.
pub fn sanitize_position(position: f64) -> f64 {
    if position.is_finite() && position > 0.0 {
        position
    } else {
        0.0
    }
}

/// Persisted admin designation for a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminGrant {
    pub admin_id: ParticipantId,
    pub previous_admin_id: Option<ParticipantId>,
    pub granted_at: DateTime<Utc>,
}

impl AdminGrant {
    pub fn new(admin_id: ParticipantId, previous_admin_id: Option<ParticipantId>) -> Self {
        Self {
            admin_id,
            previous_admin_id,
            granted_at: Utc::now(),
        }
    }
}

/// Chat line stored by the sync channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub url: String,
    pub video_id: String,
    pub title: String,
    pub enqueued_at: DateTime<Utc>,
    pub enqueued_by: ParticipantId,
}

/// A URL that resolved to a playable video id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    pub url: String,
    pub video_id: String,
}
