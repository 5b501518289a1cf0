// Room command handlers

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::client::{
    ClientState, CurrentVideo, PermissionDenied, PermissionGate, Reconciler, RoleAuthority,
    Throttle, VideoQueue,
};
use crate::config::ThrottleMode;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::models::{Participant, ParticipantId, Role, Room, RoomId};
use crate::network::{RoomEvent, SyncChannel};
use crate::player::PlaybackEngine;
use crate::session::{SessionEvent, SessionInner, WatchSession};
use crate::utils::{resolve_video_reference, retry_transient, validate_display_name};

/// Create a room for `video_url`. The URL must resolve to a video id.
pub async fn create_room(channel: &dyn SyncChannel, video_url: &str) -> Result<Room> {
    let video = resolve_video_reference(video_url)?;
    let room = channel.create_room(&video.url).await?;
    tracing::info!("Created room {} for {}", room.id, video.video_id);
    Ok(room)
}

impl WatchSession {
    /// Join `room_id` as `name`.
    ///
    /// Registers the participant, loads and aligns the room video, works out
    /// the local role and starts the background role, participant and event
    /// listeners. Setup calls to the sync channel are retried on transient
    /// failures; a video that fails to load does not fail the join.
    pub async fn join(
        channel: Arc<dyn SyncChannel>,
        engine: Arc<dyn PlaybackEngine>,
        config: SessionConfig,
        room_id: &str,
        name: &str,
    ) -> Result<WatchSession> {
        let name = validate_display_name(name)?;
        let attempts = config.setup.retry_attempts;
        let backoff = config.setup.retry_base_delay();
        let ch = &channel;

        tracing::info!("Joining room {} as {}", room_id, name);
        let room = retry_transient("room lookup", attempts, backoff, move || ch.get_room(room_id))
            .await?
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;
        let video = resolve_video_reference(&room.video_url)?;

        let display_name = name.as_str();
        let me = retry_transient("participant registration", attempts, backoff, move || {
            ch.add_participant(room_id, display_name)
        })
        .await?;

        let state = ClientState::new(name.clone());
        match engine.load(&video.video_id).await {
            Ok(()) => state.set_current_video(CurrentVideo::from(video.clone())),
            Err(e) => {
                let message = format!("Failed to load {}: {:#}", video.video_id, e);
                tracing::warn!("{}", message);
                state.set_last_error(message);
            }
        }

        let initial = retry_transient("video state fetch", attempts, backoff, move || {
            ch.get_video_state(room_id)
        })
        .await?;
        if initial.position > 0.0 {
            if let Err(e) = engine.seek(initial.position).await {
                tracing::warn!("Failed to seek to {:.2}s: {}", initial.position, e);
            }
        }
        if initial.is_playing {
            if let Err(e) = engine.play().await {
                tracing::warn!("Failed to start playback: {}", e);
            }
        }

        let authority = RoleAuthority::new(room_id.to_string(), me.id.clone(), channel.clone());
        let authority_ref = &authority;
        retry_transient("role evaluation", attempts, backoff, move || {
            authority_ref.refresh()
        })
        .await?;

        let participants = retry_transient("participant subscription", attempts, backoff, move || {
            ch.subscribe_participants(room_id)
        })
        .await?;
        let room_events = retry_transient("event subscription", attempts, backoff, move || {
            ch.subscribe_events(room_id)
        })
        .await?;
        let messages = retry_transient("message subscription", attempts, backoff, move || {
            ch.subscribe_messages(room_id)
        })
        .await?;

        let gate = PermissionGate::new(authority.watch());
        let reconciler = Reconciler::new(
            room_id.to_string(),
            channel.clone(),
            engine.clone(),
            config.clone(),
        );
        let queue = VideoQueue::new(
            room_id.to_string(),
            channel.clone(),
            engine.clone(),
            &config.queue,
        );

        let chat_throttle = Throttle::new(config.chat.min_interval(), ThrottleMode::Leading);
        let role = authority.role();
        let inner = Arc::new(SessionInner {
            config,
            room_id: room_id.to_string(),
            me,
            channel,
            engine,
            state,
            authority,
            gate,
            reconciler,
            queue,
            events: broadcast::channel(64).0,
            pending_advance: Mutex::new(None),
            chat_throttle: Mutex::new(chat_throttle),
        });
        inner.apply_role(role, false).await;

        let session = WatchSession {
            inner,
            tasks: Mutex::new(Vec::new()),
        };
        session.spawn_background(participants, room_events, messages);
        tracing::info!(
            "Joined room {} as {} ({:?})",
            session.inner.room_id,
            session.inner.me.id,
            role
        );
        Ok(session)
    }

    /// Leave the room. An admin holding an explicit grant hands it to the
    /// earliest remaining participant first.
    pub async fn leave(self) {
        self.stop_background();
        self.inner.reconciler.shutdown().await;

        let inner = &self.inner;
        if inner.authority.role().is_admin() && inner.authority.grant().is_some() {
            let successor = inner
                .authority
                .participants()
                .into_iter()
                .filter(|p| p.id != inner.me.id)
                .min_by_key(|p| p.joined_at);
            if let Some(successor) = successor {
                if let Err(e) = inner.authority.transfer(&inner.me.id, &successor.id).await {
                    tracing::warn!("Failed to hand over admin before leaving: {}", e);
                }
            }
        }

        if let Err(e) = inner
            .channel
            .remove_participant(&inner.room_id, &inner.me.id)
            .await
        {
            tracing::warn!("Failed to remove participant on leave: {}", e);
        }
        tracing::info!("Left room {}", inner.room_id);
    }

    /// Hand the admin role to another participant.
    pub async fn transfer_admin(&self, to: &ParticipantId) -> Result<()> {
        let inner = &self.inner;
        if let Some(change) = inner.authority.transfer(&inner.me.id, to).await? {
            inner.apply_role(change.current, true).await;
        }
        Ok(())
    }

    /// Broadcast a reaction to the room. Anyone may react.
    pub async fn send_reaction(&self, emoji: &str) -> Result<()> {
        let event = RoomEvent::Reaction {
            sender: self.inner.me.id.clone(),
            emoji: emoji.to_string(),
        };
        self.inner
            .channel
            .send_event(&self.inner.room_id, event)
            .await
    }

    pub async fn send_custom_event(&self, payload: Value) -> Result<()> {
        self.inner
            .channel
            .send_event(&self.inner.room_id, RoomEvent::Custom { payload })
            .await
    }

    pub fn room_id(&self) -> &RoomId {
        &self.inner.room_id
    }

    pub fn me(&self) -> &Participant {
        &self.inner.me
    }

    pub fn role(&self) -> Role {
        self.inner.authority.role()
    }

    pub fn admin_id(&self) -> Option<ParticipantId> {
        self.inner.authority.admin_id()
    }

    /// Participants as of the last role evaluation, in join order.
    pub fn participants(&self) -> Vec<Participant> {
        self.inner.authority.participants()
    }

    pub fn current_video(&self) -> Option<CurrentVideo> {
        self.inner.state.get_current_video()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state.get_last_error()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn subscribe_denials(&self) -> broadcast::Receiver<PermissionDenied> {
        self.inner.gate.subscribe_denials()
    }
}
