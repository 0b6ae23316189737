//! In-process, timer-based notification delivery.
//!
//! Each one-shot is a tokio task sleeping until its fire time. Rescheduling
//! an ID aborts the previous task; cancelling aborts it outright. Delivered
//! notifications are logged and sent on a channel for the host to display.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::{Clock, NotificationId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::NotificationError;
use crate::notifier::{NotificationContent, Notifier};

/// A notification that reached the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredNotification {
    /// Notification ID.
    pub id: NotificationId,
    /// What was shown.
    pub content: NotificationContent,
    /// When it was delivered.
    pub delivered_at: DateTime<Utc>,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Timers {
    next_generation: u64,
    pending: HashMap<NotificationId, PendingTimer>,
}

/// Timer-based [`Notifier`]. Must be used from within a tokio runtime.
pub struct LocalNotifier {
    timers: Arc<Mutex<Timers>>,
    delivered: mpsc::UnboundedSender<DeliveredNotification>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LocalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalNotifier")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl LocalNotifier {
    /// Create a notifier and the receiver on which deliveries arrive.
    pub fn new(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<DeliveredNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Self {
            timers: Arc::new(Mutex::new(Timers::default())),
            delivered: tx,
            clock,
        };
        (notifier, rx)
    }

    /// Number of timers still waiting.
    pub fn pending_count(&self) -> usize {
        self.timers.lock().pending.len()
    }

    /// Whether a timer is waiting under `id`.
    pub fn is_pending(&self, id: &NotificationId) -> bool {
        self.timers.lock().pending.contains_key(id)
    }

    fn deliver(
        tx: &mpsc::UnboundedSender<DeliveredNotification>,
        id: NotificationId,
        content: NotificationContent,
        delivered_at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        info!(
            notification_id = %id,
            title = %content.title,
            body = %content.body,
            "notification delivered"
        );
        tx.send(DeliveredNotification {
            id,
            content,
            delivered_at,
        })
        .map_err(|_| NotificationError::Unavailable("delivery channel closed".into()))
    }
}

impl Drop for LocalNotifier {
    fn drop(&mut self) {
        for (_, timer) in self.timers.lock().pending.drain() {
            timer.handle.abort();
        }
    }
}

#[async_trait]
impl Notifier for LocalNotifier {
    async fn request_permission(&self) -> Result<bool, NotificationError> {
        Ok(!self.delivered.is_closed())
    }

    async fn schedule_one_shot(
        &self,
        id: &NotificationId,
        fire_at: DateTime<Utc>,
        content: &NotificationContent,
    ) -> Result<(), NotificationError> {
        if self.delivered.is_closed() {
            return Err(NotificationError::Unavailable("delivery channel closed".into()));
        }
        let delay = (fire_at - self.clock.now()).to_std().unwrap_or_default();

        let mut timers = self.timers.lock();
        timers.next_generation += 1;
        let generation = timers.next_generation;

        let task_timers = Arc::clone(&self.timers);
        let tx = self.delivered.clone();
        let clock = Arc::clone(&self.clock);
        let task_id = id.clone();
        let task_content = content.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut timers = task_timers.lock();
                if timers
                    .pending
                    .get(&task_id)
                    .is_some_and(|t| t.generation == generation)
                {
                    let _ = timers.pending.remove(&task_id);
                }
            }
            let _ = Self::deliver(&tx, task_id, task_content, clock.now());
        });

        if let Some(previous) = timers
            .pending
            .insert(id.clone(), PendingTimer { generation, handle })
        {
            previous.handle.abort();
        }
        debug!(notification_id = %id, %fire_at, ?delay, "timer armed");
        Ok(())
    }

    async fn cancel(&self, id: &NotificationId) -> Result<(), NotificationError> {
        if let Some(timer) = self.timers.lock().pending.remove(id) {
            timer.handle.abort();
            debug!(notification_id = %id, "timer cancelled");
        }
        Ok(())
    }

    async fn fire_immediately(
        &self,
        id: &NotificationId,
        content: &NotificationContent,
    ) -> Result<(), NotificationError> {
        Self::deliver(&self.delivered, id.clone(), content.clone(), self.clock.now())
    }
}
