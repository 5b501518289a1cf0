use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{AdminGrant, Participant, ParticipantId, Role, RoomId};
use crate::network::{RoomEvent, SyncChannel};

/// Who holds admin: the persisted grant if any, else the earliest joiner.
pub fn resolve_admin_id(
    participants: &[Participant],
    persisted_admin_id: Option<&str>,
) -> Option<ParticipantId> {
    match persisted_admin_id {
        Some(admin_id) => Some(admin_id.to_string()),
        // min_by_key keeps the first of equal timestamps, i.e. list (join) order
        None => participants
            .iter()
            .min_by_key(|p| p.joined_at)
            .map(|p| p.id.clone()),
    }
}

pub fn determine_role(
    participants: &[Participant],
    self_id: &str,
    persisted_admin_id: Option<&str>,
) -> Role {
    match resolve_admin_id(participants, persisted_admin_id) {
        Some(admin_id) if admin_id == self_id => Role::Admin,
        _ => Role::Member,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChange {
    pub previous: Role,
    pub current: Role,
}

/// Tracks this session's role in a room.
///
/// The role is published on a watch channel; the permission gate and the
/// session read it from there. Refreshes and transfers run one at a time so a
/// grant read before a transfer never overwrites the one the transfer wrote.
pub struct RoleAuthority {
    room_id: RoomId,
    self_id: ParticipantId,
    channel: Arc<dyn SyncChannel>,
    participants: RwLock<Vec<Participant>>,
    grant: RwLock<Option<AdminGrant>>,
    role_tx: watch::Sender<Role>,
    sync_lock: Mutex<()>,
}

impl RoleAuthority {
    pub fn new(room_id: RoomId, self_id: ParticipantId, channel: Arc<dyn SyncChannel>) -> Self {
        Self {
            room_id,
            self_id,
            channel,
            participants: RwLock::new(Vec::new()),
            grant: RwLock::new(None),
            role_tx: watch::channel(Role::Member).0,
            sync_lock: Mutex::new(()),
        }
    }

    pub fn self_id(&self) -> &ParticipantId {
        &self.self_id
    }

    pub fn role(&self) -> Role {
        *self.role_tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<Role> {
        self.role_tx.subscribe()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.participants.read().clone()
    }

    pub fn grant(&self) -> Option<AdminGrant> {
        self.grant.read().clone()
    }

    pub fn admin_id(&self) -> Option<ParticipantId> {
        let grant = self.grant.read();
        resolve_admin_id(
            &self.participants.read(),
            grant.as_ref().map(|g| g.admin_id.as_str()),
        )
    }

    /// Re-read participants and the admin grant, then re-evaluate.
    pub async fn refresh(&self) -> Result<Option<RoleChange>> {
        let _sync = self.sync_lock.lock().await;
        let (participants, grant) = futures::try_join!(
            self.channel.list_participants(&self.room_id),
            self.channel.get_admin_grant(&self.room_id),
        )?;
        *self.participants.write() = participants;
        *self.grant.write() = grant;
        Ok(self.evaluate())
    }

    /// Apply a pushed participant list against the cached grant, without a
    /// round trip.
    pub async fn update_participants(
        &self,
        participants: Vec<Participant>,
    ) -> Option<RoleChange> {
        let _sync = self.sync_lock.lock().await;
        *self.participants.write() = participants;
        self.evaluate()
    }

    fn evaluate(&self) -> Option<RoleChange> {
        let role = {
            let grant = self.grant.read();
            determine_role(
                &self.participants.read(),
                &self.self_id,
                grant.as_ref().map(|g| g.admin_id.as_str()),
            )
        };
        let previous = self.role_tx.send_replace(role);
        if previous == role {
            return None;
        }
        info!(
            "Role in room {} changed from {:?} to {:?}",
            self.room_id, previous, role
        );
        Some(RoleChange {
            previous,
            current: role,
        })
    }

    /// Hand admin from `from_id` to `to_id`.
    ///
    /// `to_id` is checked against a fresh participant list. The grant is
    /// persisted before the local role flips, so a failed write leaves this
    /// session admin. The transfer broadcast is fire-and-forget.
    pub async fn transfer(&self, from_id: &str, to_id: &str) -> Result<Option<RoleChange>> {
        if from_id != self.self_id || !self.role().is_admin() {
            return Err(Error::NotAuthorized(from_id.to_string()));
        }
        if from_id == to_id {
            debug!("Transfer to self ignored");
            return Ok(None);
        }

        let _sync = self.sync_lock.lock().await;
        if !self.role().is_admin() {
            return Err(Error::NotAuthorized(from_id.to_string()));
        }
        let participants = self.channel.list_participants(&self.room_id).await?;
        *self.participants.write() = participants;

        let (from_name, to_name) = {
            let participants = self.participants.read();
            let name_of = |id: &str| {
                participants
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.name.clone())
            };
            let to_name =
                name_of(to_id).ok_or_else(|| Error::ParticipantNotFound(to_id.to_string()))?;
            (name_of(from_id).unwrap_or_default(), to_name)
        };

        let grant = AdminGrant::new(to_id.to_string(), Some(from_id.to_string()));
        self.channel
            .set_admin_grant(&self.room_id, grant.clone())
            .await?;
        *self.grant.write() = Some(grant);
        let change = self.evaluate();
        info!("Transferred admin of room {} to {}", self.room_id, to_name);

        let channel = self.channel.clone();
        let room_id = self.room_id.clone();
        let event = RoomEvent::AdminTransfer {
            new_admin_id: to_id.to_string(),
            new_admin_name: to_name,
            previous_admin_id: from_id.to_string(),
            previous_admin_name: from_name,
        };
        tokio::spawn(async move {
            if let Err(e) = channel.send_event(&room_id, event).await {
                warn!("Failed to broadcast admin transfer: {}", e);
            }
        });

        Ok(change)
    }
}
