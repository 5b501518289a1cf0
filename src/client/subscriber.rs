use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::sync::{SyncAction, SyncEngine};
use crate::models::VideoState;
use crate::network::Subscription;
use crate::player::PlaybackEngine;

/// Member side of the reconciler: sync channel updates to the local player.
///
/// Holds no handle to the sync channel beyond its read-only subscription, so
/// there is no way to publish from here.
pub struct Subscriber {
    core: Arc<SubscriberCore>,
    task: JoinHandle<()>,
}

struct SubscriberCore {
    engine: Arc<dyn PlaybackEngine>,
    sync: SyncEngine,
    last_applied: Mutex<Option<VideoState>>,
}

impl Subscriber {
    pub fn spawn(
        mut subscription: Subscription<VideoState>,
        engine: Arc<dyn PlaybackEngine>,
        sync: SyncEngine,
    ) -> Self {
        let core = Arc::new(SubscriberCore {
            engine,
            sync,
            last_applied: Mutex::new(None),
        });
        let task_core = core.clone();
        let task = tokio::spawn(async move {
            while let Some(state) = subscription.recv().await {
                task_core.apply(&state).await;
            }
            debug!("Video state subscription closed");
        });
        Self { core, task }
    }

    /// Reconcile the local player against `state` once.
    pub async fn apply(&self, state: &VideoState) -> Vec<SyncAction> {
        self.core.apply(state).await
    }

    pub fn last_applied(&self) -> Option<VideoState> {
        self.core.last_applied.lock().clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SubscriberCore {
    async fn apply(&self, state: &VideoState) -> Vec<SyncAction> {
        {
            let mut last = self.last_applied.lock();
            if let Some(previous) = last.as_ref() {
                if state.updated_at < previous.updated_at {
                    debug!("Ignoring out-of-order video state from {}", state.updated_at);
                    return Vec::new();
                }
            }
            *last = Some(state.clone());
        }

        let snapshot = self.engine.snapshot();
        let actions =
            self.sync
                .calculate_sync_actions(snapshot.position, snapshot.status.is_playing(), state);

        for action in &actions {
            let result = match action {
                SyncAction::None => Ok(()),
                SyncAction::Seek(position) => self.engine.seek(*position).await,
                SyncAction::Play => self.engine.play().await,
                SyncAction::Pause => self.engine.pause().await,
            };
            if let Err(e) = result {
                warn!("Failed to apply {:?}: {}", action, e);
            }
        }
        actions
    }
}
