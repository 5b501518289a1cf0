use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::{
    ClientState, CurrentVideo, PermissionGate, Reconciler, ReconcilerOutcome, RoleAuthority,
    Throttle, VideoQueue,
};
use crate::config::SessionConfig;
use crate::models::{ChatMessage, Participant, ParticipantId, Role, RoomId};
use crate::network::{RoomEvent, Subscription, SyncChannel};
use crate::player::{PlaybackEngine, PlayerEvent};

/// Notifications for the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RoleChanged(Role),
    ParticipantsChanged(Vec<Participant>),
    VideoChanged(CurrentVideo),
    PlaybackFailed { code: Option<i32>, message: String },
    Reaction { sender: ParticipantId, emoji: String },
    Message(ChatMessage),
    AdminTransferred { new_admin_id: ParticipantId, new_admin_name: String },
    /// A forced publish reached the sync channel
    Synced,
}

/// One participant's membership in a room.
///
/// Owns the role authority, permission gate, reconciler and queue for the
/// session and wires them together. Dropping it stops all background work;
/// [`WatchSession::leave`] also removes the participant from the room.
pub struct WatchSession {
    pub(crate) inner: Arc<SessionInner>,
    pub(crate) tasks: Mutex<Vec<JoinHandle<()>>>,
}

pub(crate) struct SessionInner {
    pub(crate) config: SessionConfig,
    pub(crate) room_id: RoomId,
    pub(crate) me: Participant,
    pub(crate) channel: Arc<dyn SyncChannel>,
    pub(crate) engine: Arc<dyn PlaybackEngine>,
    pub(crate) state: Arc<ClientState>,
    pub(crate) authority: RoleAuthority,
    pub(crate) gate: PermissionGate,
    pub(crate) reconciler: Reconciler,
    pub(crate) queue: Arc<VideoQueue>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    pub(crate) pending_advance: Mutex<Option<JoinHandle<()>>>,
    pub(crate) chat_throttle: Mutex<Throttle<()>>,
}

impl SessionInner {
    pub(crate) fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Re-read the room's participants and grant, then rewire if needed.
    pub(crate) async fn reevaluate_role(&self) {
        match self.authority.refresh().await {
            Ok(change) => self.apply_role(self.authority.role(), change.is_some()).await,
            Err(e) => warn!("Failed to refresh role: {}", e),
        }
    }

    pub(crate) async fn apply_role(&self, role: Role, announce: bool) {
        match self.reconciler.apply_role(role).await {
            Ok(true) if role.is_admin() => {
                let restored = self.queue.restore().await;
                if restored > 0 {
                    info!("Resuming with {} queued videos", restored);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to switch reconciler to {:?}: {}", role, e),
        }
        if !role.is_admin() {
            self.cancel_advance();
        }
        if announce {
            self.emit(SessionEvent::RoleChanged(role));
        }
    }

    pub(crate) async fn handle_participants(&self, participants: Vec<Participant>) {
        self.emit(SessionEvent::ParticipantsChanged(participants.clone()));
        let change = self.authority.update_participants(participants).await;
        self.apply_role(self.authority.role(), change.is_some()).await;
    }

    pub(crate) async fn handle_player_event(self: &Arc<Self>, event: PlayerEvent) {
        let queue_pending = !self.queue.is_empty();
        match self.reconciler.handle_player_event(&event, queue_pending).await {
            ReconcilerOutcome::None => {}
            ReconcilerOutcome::AdvanceQueue { delay } => self.schedule_advance(delay),
            ReconcilerOutcome::PlaybackFailed(code) => {
                let message = code.to_string();
                self.state.set_last_error(message.clone());
                self.emit(SessionEvent::PlaybackFailed {
                    code: Some(code.code()),
                    message,
                });
            }
        }
    }

    pub(crate) async fn handle_room_event(&self, event: RoomEvent) {
        match event {
            RoomEvent::AdminTransfer {
                new_admin_id,
                new_admin_name,
                ..
            } => {
                self.emit(SessionEvent::AdminTransferred {
                    new_admin_id,
                    new_admin_name,
                });
                self.reevaluate_role().await;
            }
            RoomEvent::VideoChanged {
                url,
                video_id,
                title,
            } => {
                if self.authority.role().is_admin() {
                    return;
                }
                let current = self.state.get_current_video().map(|v| v.video_id);
                if current.as_deref() == Some(video_id.as_str()) {
                    return;
                }
                let video = CurrentVideo {
                    url,
                    video_id,
                    title: Some(title),
                };
                // State updates that arrived while loading were applied to
                // the previous video, and the load reset the player.
                if self.load_video(video).await {
                    if let Err(e) = self.reconciler.resync().await {
                        warn!("Failed to resync after loading: {}", e);
                    }
                }
            }
            RoomEvent::Reaction { sender, emoji } => {
                self.emit(SessionEvent::Reaction { sender, emoji });
            }
            RoomEvent::Custom { payload } => {
                debug!("Ignoring custom room event: {}", payload);
            }
        }
    }

    pub(crate) async fn load_video(&self, video: CurrentVideo) -> bool {
        match self.engine.load(&video.video_id).await {
            Ok(()) => {
                info!("Loaded {}", video.video_id);
                self.state.set_current_video(video.clone());
                self.emit(SessionEvent::VideoChanged(video));
                true
            }
            Err(e) => {
                let message = format!("Failed to load {}: {:#}", video.video_id, e);
                warn!("{}", message);
                self.state.set_last_error(message.clone());
                self.emit(SessionEvent::PlaybackFailed {
                    code: None,
                    message,
                });
                false
            }
        }
    }

    /// Load the next playable queue item.
    pub(crate) async fn advance_queue(&self) -> bool {
        if self.queue.next().await {
            if let Some(item) = self.queue.current() {
                let video = CurrentVideo {
                    url: item.url,
                    video_id: item.video_id,
                    title: Some(item.title),
                };
                self.state.set_current_video(video.clone());
                self.emit(SessionEvent::VideoChanged(video));
            }
            return true;
        }
        if self.queue.is_empty() && !self.queue.is_advancing() {
            let message = "No playable videos left in the queue".to_string();
            self.state.set_last_error(message.clone());
            self.emit(SessionEvent::PlaybackFailed {
                code: None,
                message,
            });
        }
        false
    }

    pub(crate) fn schedule_advance(self: &Arc<Self>, delay: Duration) {
        debug!("Advancing queue in {:?}", delay);
        let inner = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.authority.role().is_admin() {
                inner.advance_queue().await;
            }
        });
        if let Some(previous) = self.pending_advance.lock().replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn cancel_advance(&self) {
        if let Some(handle) = self.pending_advance.lock().take() {
            handle.abort();
        }
    }
}

impl WatchSession {
    pub(crate) fn spawn_background(
        &self,
        mut participants: Subscription<Vec<Participant>>,
        mut room_events: Subscription<RoomEvent>,
        mut messages: Subscription<ChatMessage>,
    ) {
        let period = self.inner.config.roles.poll_interval();
        let poller = self.inner.clone();
        let poll_task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                poller.reevaluate_role().await;
            }
        });

        let listener = self.inner.clone();
        let participants_task = tokio::spawn(async move {
            while let Some(list) = participants.recv().await {
                listener.handle_participants(list).await;
            }
            debug!("Participant feed closed");
        });

        let listener = self.inner.clone();
        let events_task = tokio::spawn(async move {
            while let Some(event) = room_events.recv().await {
                listener.handle_room_event(event).await;
            }
            debug!("Room event feed closed");
        });

        let listener = self.inner.clone();
        let messages_task = tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                listener.emit(SessionEvent::Message(message));
            }
            debug!("Message feed closed");
        });

        self.tasks
            .lock()
            .extend([poll_task, participants_task, events_task, messages_task]);
    }

    /// Feed player events into the session from the embed adapter.
    pub fn attach_player_events(&self, mut rx: mpsc::UnboundedReceiver<PlayerEvent>) {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                inner.handle_player_event(event).await;
            }
            debug!("Player event stream closed");
        });
        self.tasks.lock().push(task);
    }

    /// Handle a single player event.
    pub async fn handle_player_event(&self, event: PlayerEvent) {
        self.inner.handle_player_event(event).await;
    }

    pub(crate) fn stop_background(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.inner.cancel_advance();
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop_background();
    }
}
