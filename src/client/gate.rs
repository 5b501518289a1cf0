use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Role;

/// Actions only the room admin may perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatedAction {
    Play,
    Pause,
    Seek,
    ChangeSpeed,
    ChangeQuality,
    ToggleFullscreen,
    QueueAdd,
    QueueRemove,
    QueueClear,
    QueueNext,
    SyncNow,
}

impl GatedAction {
    pub const ALL: [GatedAction; 11] = [
        Self::Play,
        Self::Pause,
        Self::Seek,
        Self::ChangeSpeed,
        Self::ChangeQuality,
        Self::ToggleFullscreen,
        Self::QueueAdd,
        Self::QueueRemove,
        Self::QueueClear,
        Self::QueueNext,
        Self::SyncNow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Seek => "seek",
            Self::ChangeSpeed => "change_speed",
            Self::ChangeQuality => "change_quality",
            Self::ToggleFullscreen => "toggle_fullscreen",
            Self::QueueAdd => "queue_add",
            Self::QueueRemove => "queue_remove",
            Self::QueueClear => "queue_clear",
            Self::QueueNext => "queue_next",
            Self::SyncNow => "sync_now",
        }
    }

    /// Phrase used in denial messages, "Only the room admin can ..."
    pub fn description(self) -> &'static str {
        match self {
            Self::Play => "play the video",
            Self::Pause => "pause the video",
            Self::Seek => "seek in the video",
            Self::ChangeSpeed => "change playback speed",
            Self::ChangeQuality => "change video quality",
            Self::ToggleFullscreen => "toggle fullscreen",
            Self::QueueAdd => "add videos to queue",
            Self::QueueRemove => "remove videos from queue",
            Self::QueueClear => "clear the queue",
            Self::QueueNext => "change the video",
            Self::SyncNow => "sync participants",
        }
    }
}

impl fmt::Display for GatedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `role` may perform `action`.
pub fn guard(_action: GatedAction, role: Role) -> bool {
    role.is_admin()
}

/// Emitted every time a gated action is refused
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionDenied {
    pub action: GatedAction,
    pub at: DateTime<Utc>,
}

/// Single authorization point for privileged operations.
///
/// Reads the live role published by the role authority, so a role flip is
/// reflected on the very next call.
pub struct PermissionGate {
    role: watch::Receiver<Role>,
    denials: broadcast::Sender<PermissionDenied>,
}

impl PermissionGate {
    pub fn new(role: watch::Receiver<Role>) -> Self {
        Self {
            role,
            denials: broadcast::channel(32).0,
        }
    }

    pub fn role(&self) -> Role {
        *self.role.borrow()
    }

    pub fn subscribe_denials(&self) -> broadcast::Receiver<PermissionDenied> {
        self.denials.subscribe()
    }

    pub fn check(&self, action: GatedAction) -> Result<()> {
        if guard(action, self.role()) {
            return Ok(());
        }
        debug!("Permission denied: {}", action);
        let _ = self.denials.send(PermissionDenied {
            action,
            at: Utc::now(),
        });
        Err(Error::PermissionDenied(action))
    }

    /// Run `f(args)` only if the current role allows `action`.
    pub async fn invoke<A, T, F, Fut>(&self, action: GatedAction, args: A, f: F) -> Result<T>
    where
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.check(action)?;
        f(args).await
    }

    pub fn invoke_sync<A, T, F>(&self, action: GatedAction, args: A, f: F) -> Result<T>
    where
        F: FnOnce(A) -> T,
    {
        self.check(action)?;
        Ok(f(args))
    }
}
