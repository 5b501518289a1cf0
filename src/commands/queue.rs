// Queue command handlers

use tokio::sync::broadcast;

use crate::client::{GatedAction, QueueEvent};
use crate::error::{Error, Result};
use crate::models::{QueueItem, QueueItemId};
use crate::session::WatchSession;

impl WatchSession {
    /// Queue a video. Fails with `InvalidVideoReference` if the URL has no
    /// resolvable video id.
    pub async fn add_to_queue(&self, url: &str, title: Option<&str>) -> Result<()> {
        let inner = &self.inner;
        inner
            .gate
            .invoke(GatedAction::QueueAdd, (url, title), |(url, title)| async move {
                if inner.queue.add(url, title, &inner.me.id).await {
                    Ok(())
                } else {
                    Err(Error::InvalidVideoReference(url.trim().to_string()))
                }
            })
            .await
    }

    /// Returns whether an item was removed.
    pub async fn remove_from_queue(&self, item_id: &QueueItemId) -> Result<bool> {
        let queue = &self.inner.queue;
        self.inner
            .gate
            .invoke(GatedAction::QueueRemove, item_id, |item_id| async move {
                Ok(queue.remove(item_id).await)
            })
            .await
    }

    pub async fn clear_queue(&self) -> Result<()> {
        let queue = &self.inner.queue;
        self.inner
            .gate
            .invoke(GatedAction::QueueClear, (), |_| async move {
                queue.clear().await;
                Ok(())
            })
            .await
    }

    /// Skip to the next queued video. Supersedes a pending automatic advance.
    pub async fn next_video(&self) -> Result<bool> {
        let inner = &self.inner;
        inner
            .gate
            .invoke(GatedAction::QueueNext, (), |_| async move {
                inner.cancel_advance();
                Ok(inner.advance_queue().await)
            })
            .await
    }

    pub fn queue_items(&self) -> Vec<QueueItem> {
        self.inner.queue.items()
    }

    pub fn subscribe_queue(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.queue.subscribe()
    }
}
