use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::QueueSettings;
use crate::models::{ParticipantId, QueueItem, QueueItemId, RoomId};
use crate::network::{RoomEvent, SyncChannel};
use crate::player::PlaybackEngine;
use crate::utils::resolve_video_reference;

/// Notifications for whoever renders the queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Changed(Vec<QueueItem>),
    NowPlaying(QueueItem),
    LoadFailed { item: QueueItem, reason: String },
}

struct AdvanceGuard<'a> {
    flag: &'a Mutex<bool>,
}

impl<'a> AdvanceGuard<'a> {
    fn new(flag: &'a Mutex<bool>) -> Self {
        Self { flag }
    }
}

impl<'a> Drop for AdvanceGuard<'a> {
    fn drop(&mut self) {
        *self.flag.lock() = false;
    }
}

/// Ordered list of videos waiting to play in a room.
///
/// Mutations are not permission checked here; callers go through the
/// permission gate first.
pub struct VideoQueue {
    room_id: RoomId,
    channel: Arc<dyn SyncChannel>,
    engine: Arc<dyn PlaybackEngine>,
    default_title: String,
    items: RwLock<VecDeque<QueueItem>>,
    current: RwLock<Option<QueueItem>>,
    advancing: Mutex<bool>,
    next_seq: AtomicU64,
    events: broadcast::Sender<QueueEvent>,
}

impl VideoQueue {
    pub fn new(
        room_id: RoomId,
        channel: Arc<dyn SyncChannel>,
        engine: Arc<dyn PlaybackEngine>,
        settings: &QueueSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            room_id,
            channel,
            engine,
            default_title: settings.default_title.clone(),
            items: RwLock::new(VecDeque::new()),
            current: RwLock::new(None),
            advancing: Mutex::new(false),
            next_seq: AtomicU64::new(1),
            events: broadcast::channel(32).0,
        })
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.items.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// The item most recently loaded by [`VideoQueue::next`].
    pub fn current(&self) -> Option<QueueItem> {
        self.current.read().clone()
    }

    pub fn is_advancing(&self) -> bool {
        *self.advancing.lock()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Append a video. Returns `false` without touching the queue if the URL
    /// does not resolve to a video id.
    pub async fn add(&self, url: &str, title: Option<&str>, enqueued_by: &ParticipantId) -> bool {
        let video = match resolve_video_reference(url) {
            Ok(video) => video,
            Err(e) => {
                warn!("Not queueing {}: {}", url, e);
                return false;
            }
        };
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.default_title.as_str())
            .to_string();
        let item = QueueItem {
            id: format!(
                "{}-{}",
                Utc::now().timestamp_millis(),
                self.next_seq.fetch_add(1, Ordering::SeqCst)
            ),
            url: video.url,
            video_id: video.video_id,
            title,
            enqueued_at: Utc::now(),
            enqueued_by: enqueued_by.clone(),
        };
        info!("Adding {} ({}) to queue", item.title, item.video_id);
        self.items.write().push_back(item);
        self.changed().await;
        true
    }

    /// Remove an item by id. Unknown ids are ignored.
    pub async fn remove(&self, item_id: &QueueItemId) -> bool {
        let removed = {
            let mut items = self.items.write();
            let before = items.len();
            items.retain(|item| &item.id != item_id);
            items.len() != before
        };
        if !removed {
            debug!("Queue item {} not found, nothing removed", item_id);
            return false;
        }
        info!("Removed queue item {}", item_id);
        self.changed().await;
        true
    }

    pub async fn clear(&self) {
        info!("Clearing queue");
        self.items.write().clear();
        self.changed().await;
    }

    /// Pop the head and load it, skipping items that fail to load.
    ///
    /// Returns `false` immediately if the queue is empty or another advance is
    /// in flight, and `false` if every remaining item failed to load.
    pub async fn next(&self) -> bool {
        {
            let mut advancing = self.advancing.lock();
            if *advancing {
                debug!("Queue advance already in progress");
                return false;
            }
            if self.items.read().is_empty() {
                return false;
            }
            *advancing = true;
        }
        let _advance_guard = AdvanceGuard::new(&self.advancing);

        loop {
            let head = self.items.write().pop_front();
            let Some(item) = head else {
                warn!("Queue exhausted without a playable video");
                self.changed().await;
                return false;
            };

            match self.engine.load(&item.video_id).await {
                Ok(()) => {
                    info!("Now playing {} ({})", item.title, item.video_id);
                    *self.current.write() = Some(item.clone());
                    self.announce(&item).await;
                    let _ = self.events.send(QueueEvent::NowPlaying(item));
                    self.changed().await;
                    return true;
                }
                Err(e) => {
                    warn!("Failed to load {}: {:#}", item.video_id, e);
                    let _ = self.events.send(QueueEvent::LoadFailed {
                        item,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }
    }

    /// Pick up a queue persisted by a previous admin. A non-empty local queue
    /// is kept as is.
    pub async fn restore(&self) -> usize {
        if !self.is_empty() {
            return self.len();
        }
        match self.channel.load_queue(&self.room_id).await {
            Ok(saved) if !saved.is_empty() => {
                let count = saved.len();
                {
                    let mut items = self.items.write();
                    if items.is_empty() {
                        items.extend(saved);
                    }
                }
                info!("Restored {} queued videos for room {}", count, self.room_id);
                let _ = self.events.send(QueueEvent::Changed(self.items()));
                self.len()
            }
            Ok(_) => 0,
            Err(e) => {
                warn!("Failed to restore queue: {}", e);
                0
            }
        }
    }

    async fn announce(&self, item: &QueueItem) {
        if let Err(e) = self.channel.update_room_video(&self.room_id, &item.url).await {
            warn!("Failed to update room video: {}", e);
        }
        let event = RoomEvent::VideoChanged {
            url: item.url.clone(),
            video_id: item.video_id.clone(),
            title: item.title.clone(),
        };
        if let Err(e) = self.channel.send_event(&self.room_id, event).await {
            warn!("Failed to broadcast video change: {}", e);
        }
    }

    async fn changed(&self) {
        let items = self.items();
        if let Err(e) = self.channel.store_queue(&self.room_id, &items).await {
            warn!("Failed to persist queue: {}", e);
        }
        let _ = self.events.send(QueueEvent::Changed(items));
    }
}
