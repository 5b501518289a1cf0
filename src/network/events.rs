use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ParticipantId;

/// Best-effort side channel messages shared by everyone in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    AdminTransfer {
        new_admin_id: ParticipantId,
        new_admin_name: String,
        previous_admin_id: ParticipantId,
        previous_admin_name: String,
    },
    VideoChanged {
        url: String,
        video_id: String,
        title: String,
    },
    Reaction {
        sender: ParticipantId,
        emoji: String,
    },
    Custom {
        payload: Value,
    },
}

impl RoomEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AdminTransfer { .. } => "admin_transfer",
            Self::VideoChanged { .. } => "video_changed",
            Self::Reaction { .. } => "reaction",
            Self::Custom { .. } => "custom",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_admin_transfer_wire_format() {
        let event = RoomEvent::AdminTransfer {
            new_admin_id: "p2".into(),
            new_admin_name: "Bob".into(),
            previous_admin_id: "p1".into(),
            previous_admin_name: "Alice".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "admin_transfer");
        assert_eq!(value["new_admin_id"], "p2");
        assert_eq!(event.kind(), "admin_transfer");
    }

    #[test]
    fn test_custom_payload_parses() {
        let event: RoomEvent =
            serde_json::from_value(json!({"type": "custom", "payload": {"confetti": true}}))
                .unwrap();
        assert_eq!(
            event,
            RoomEvent::Custom {
                payload: json!({"confetti": true})
            }
        );
    }
}
