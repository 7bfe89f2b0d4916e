//! Ongoing notification dispatch.
//!
//! Every notifier call goes through one dispatch task, which plays the role of
//! the UI-affine context: calls run one at a time, in submission order. The
//! task is also the single deduplication authority for notification content.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::error::{PulseError, Result};

/// Fixed identity of the monitoring notification. Other notification
/// surfaces must use different ids.
pub const ONGOING_NOTIFICATION_ID: u32 = 1;
pub const MONITOR_CHANNEL_ID: &str = "device_monitor";
pub const OPEN_DASHBOARD_ACTION: &str = "open_dashboard";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
}

impl ChannelSpec {
    pub fn monitor() -> Self {
        Self {
            id: MONITOR_CHANNEL_ID.to_string(),
            name: "Device monitor".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationContent {
    pub id: u32,
    pub channel_id: String,
    pub title: String,
    pub body: String,
    /// Ongoing notifications cannot be dismissed by the user
    pub ongoing: bool,
    pub tap_action: String,
}

impl NotificationContent {
    pub fn ongoing(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: ONGOING_NOTIFICATION_ID,
            channel_id: MONITOR_CHANNEL_ID.to_string(),
            title: title.into(),
            body: body.into(),
            ongoing: true,
            tap_action: OPEN_DASHBOARD_ACTION.to_string(),
        }
    }

    fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Host notification surface
pub trait Notifier: Send + Sync {
    fn channel_exists(&self, channel_id: &str) -> bool;

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()>;

    fn post(&self, content: &NotificationContent) -> Result<()>;

    fn cancel(&self, id: u32) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Posted,
    Suppressed,
}

enum DispatchCommand {
    EnsureChannel(oneshot::Sender<Result<()>>),
    Post(NotificationContent, oneshot::Sender<Result<PostOutcome>>),
    Cancel(u32, oneshot::Sender<Result<()>>),
}

/// Handle to the dispatch task
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<DispatchCommand>,
}

impl NotificationDispatcher {
    pub fn spawn(notifier: Arc<dyn Notifier>, channel: ChannelSpec, dedup_window: Duration) -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(dispatch_task(rx, notifier, channel, dedup_window));
        Self { tx }
    }

    /// Create the channel unless it already exists.
    pub async fn ensure_channel(&self) -> Result<()> {
        self.request(DispatchCommand::EnsureChannel).await?
    }

    pub async fn post(&self, content: NotificationContent) -> Result<PostOutcome> {
        self.request(|ack| DispatchCommand::Post(content, ack)).await?
    }

    pub async fn cancel(&self, id: u32) -> Result<()> {
        self.request(|ack| DispatchCommand::Cancel(id, ack)).await?
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> DispatchCommand,
    ) -> Result<T> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(build(ack_tx))
            .await
            .map_err(|_| PulseError::notification("dispatcher stopped"))?;
        ack_rx
            .await
            .map_err(|_| PulseError::notification("dispatcher dropped the request"))
    }
}

async fn dispatch_task(
    mut rx: mpsc::Receiver<DispatchCommand>,
    notifier: Arc<dyn Notifier>,
    channel: ChannelSpec,
    dedup_window: Duration,
) {
    // id -> (content hash, posted at)
    let mut last_posted: HashMap<u32, (u64, Instant)> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            DispatchCommand::EnsureChannel(ack) => {
                let result = if notifier.channel_exists(&channel.id) {
                    Ok(())
                } else {
                    notifier.create_channel(&channel)
                };
                let _ = ack.send(result);
            }
            DispatchCommand::Post(content, ack) => {
                let hash = content.content_hash();
                let now = Instant::now();
                let duplicate = last_posted.get(&content.id).is_some_and(|(h, at)| {
                    *h == hash && now.duration_since(*at) < dedup_window
                });

                let result = if duplicate {
                    log::trace!("Suppressed duplicate notification {}", content.id);
                    Ok(PostOutcome::Suppressed)
                } else {
                    notifier.post(&content).map(|_| {
                        last_posted.insert(content.id, (hash, now));
                        PostOutcome::Posted
                    })
                };
                let _ = ack.send(result);
            }
            DispatchCommand::Cancel(id, ack) => {
                last_posted.remove(&id);
                let _ = ack.send(notifier.cancel(id));
            }
        }
    }
}

/// Notifier for headless hosts: keeps the channel registry in memory and
/// writes content to the log.
#[derive(Default)]
pub struct LogNotifier {
    channels: Mutex<HashSet<String>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn channel_exists(&self, channel_id: &str) -> bool {
        self.channels.lock().contains(channel_id)
    }

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        log::debug!("Registered notification channel {}", channel.id);
        self.channels.lock().insert(channel.id.clone());
        Ok(())
    }

    fn post(&self, content: &NotificationContent) -> Result<()> {
        log::debug!("[{}] {}\n{}", content.id, content.title, content.body);
        Ok(())
    }

    fn cancel(&self, id: u32) -> Result<()> {
        log::debug!("Cancelled notification {}", id);
        Ok(())
    }
}

/// Notifier that records every call, for embedding hosts and tests
#[derive(Default)]
pub struct MemoryNotifier {
    channels: Mutex<Vec<ChannelSpec>>,
    posted: Mutex<Vec<NotificationContent>>,
    cancelled: Mutex<Vec<u32>>,
    fail_channel_creation: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose channel creation always fails
    pub fn refusing_channels() -> Self {
        Self {
            fail_channel_creation: true,
            ..Self::default()
        }
    }

    pub fn channels(&self) -> Vec<ChannelSpec> {
        self.channels.lock().clone()
    }

    pub fn posted(&self) -> Vec<NotificationContent> {
        self.posted.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<u32> {
        self.cancelled.lock().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn channel_exists(&self, channel_id: &str) -> bool {
        self.channels.lock().iter().any(|c| c.id == channel_id)
    }

    fn create_channel(&self, channel: &ChannelSpec) -> Result<()> {
        if self.fail_channel_creation {
            return Err(PulseError::notification("channel creation refused"));
        }
        self.channels.lock().push(channel.clone());
        Ok(())
    }

    fn post(&self, content: &NotificationContent) -> Result<()> {
        self.posted.lock().push(content.clone());
        Ok(())
    }

    fn cancel(&self, id: u32) -> Result<()> {
        self.cancelled.lock().push(id);
        Ok(())
    }
}
