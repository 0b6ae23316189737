//! A notifier that records every call instead of delivering anything.
//!
//! Models the platform's pending-request table so tests can assert on what
//! would still fire, not just on the call log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::NotificationId;
use parking_lot::Mutex;

use crate::errors::NotificationError;
use crate::notifier::{NotificationContent, Notifier};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    /// `request_permission`.
    RequestPermission,
    /// `schedule_one_shot`.
    Schedule {
        /// Notification ID.
        id: NotificationId,
        /// Requested fire time.
        fire_at: DateTime<Utc>,
        /// Content.
        content: NotificationContent,
    },
    /// `cancel`.
    Cancel {
        /// Notification ID.
        id: NotificationId,
    },
    /// `fire_immediately`.
    Fire {
        /// Notification ID.
        id: NotificationId,
        /// Content.
        content: NotificationContent,
    },
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<NotifierCall>,
    pending: HashMap<NotificationId, (DateTime<Utc>, NotificationContent)>,
    fired: Vec<(NotificationId, NotificationContent)>,
}

/// Recording fake for [`Notifier`].
#[derive(Debug)]
pub struct RecordingNotifier {
    recorded: Mutex<Recorded>,
    grant: AtomicBool,
    fail: Mutex<Option<NotificationError>>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            recorded: Mutex::new(Recorded::default()),
            grant: AtomicBool::new(true),
            fail: Mutex::new(None),
        }
    }
}

impl RecordingNotifier {
    /// Notifier that grants permission and succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer future permission requests with `granted`.
    pub fn set_permission(&self, granted: bool) {
        self.grant.store(granted, Ordering::SeqCst);
    }

    /// Fail every delivery call with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<NotificationError>) {
        *self.fail.lock() = error;
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.recorded.lock().calls.clone()
    }

    /// Scheduled notifications that have not been cancelled.
    pub fn pending(&self) -> HashMap<NotificationId, DateTime<Utc>> {
        self.recorded
            .lock()
            .pending
            .iter()
            .map(|(id, (at, _))| (id.clone(), *at))
            .collect()
    }

    /// Content of a pending notification.
    pub fn pending_content(&self, id: &NotificationId) -> Option<NotificationContent> {
        self.recorded.lock().pending.get(id).map(|(_, c)| c.clone())
    }

    /// Immediately fired notifications, in order.
    pub fn fired(&self) -> Vec<(NotificationId, NotificationContent)> {
        self.recorded.lock().fired.clone()
    }

    /// How many times `id` was fired immediately.
    pub fn fired_count(&self, id: &NotificationId) -> usize {
        self.recorded
            .lock()
            .fired
            .iter()
            .filter(|(fired, _)| fired == id)
            .count()
    }

    /// Forget all recorded calls (pending state is kept).
    pub fn clear_calls(&self) {
        self.recorded.lock().calls.clear();
    }

    fn check_failure(&self) -> Result<(), NotificationError> {
        match self.fail.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn request_permission(&self) -> Result<bool, NotificationError> {
        self.recorded.lock().calls.push(NotifierCall::RequestPermission);
        Ok(self.grant.load(Ordering::SeqCst))
    }

    async fn schedule_one_shot(
        &self,
        id: &NotificationId,
        fire_at: DateTime<Utc>,
        content: &NotificationContent,
    ) -> Result<(), NotificationError> {
        let mut recorded = self.recorded.lock();
        recorded.calls.push(NotifierCall::Schedule {
            id: id.clone(),
            fire_at,
            content: content.clone(),
        });
        self.check_failure()?;
        let _ = recorded
            .pending
            .insert(id.clone(), (fire_at, content.clone()));
        Ok(())
    }

    async fn cancel(&self, id: &NotificationId) -> Result<(), NotificationError> {
        let mut recorded = self.recorded.lock();
        recorded.calls.push(NotifierCall::Cancel { id: id.clone() });
        self.check_failure()?;
        let _ = recorded.pending.remove(id);
        Ok(())
    }

    async fn fire_immediately(
        &self,
        id: &NotificationId,
        content: &NotificationContent,
    ) -> Result<(), NotificationError> {
        let mut recorded = self.recorded.lock();
        recorded.calls.push(NotifierCall::Fire {
            id: id.clone(),
            content: content.clone(),
        });
        self.check_failure()?;
        recorded.fired.push((id.clone(), content.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schedule_replaces_and_cancel_removes() {
        let n = RecordingNotifier::new();
        let id = NotificationId::from("t1");
        let content = NotificationContent::new("a", "b");
        let t0 = Utc::now();

        n.schedule_one_shot(&id, t0, &content).await.unwrap();
        n.schedule_one_shot(&id, t0 + chrono::Duration::hours(1), &content)
            .await
            .unwrap();
        assert_eq!(n.pending().len(), 1);
        assert_eq!(n.pending()[&id], t0 + chrono::Duration::hours(1));

        n.cancel(&id).await.unwrap();
        assert!(n.pending().is_empty());
        assert_eq!(n.calls().len(), 3);
    }

    #[tokio::test]
    async fn failure_is_recorded_but_not_applied() {
        let n = RecordingNotifier::new();
        n.fail_with(Some(NotificationError::Unavailable("down".into())));
        let id = NotificationId::from("t1");

        let result = n
            .fire_immediately(&id, &NotificationContent::new("a", "b"))
            .await;
        assert_eq!(result, Err(NotificationError::Unavailable("down".into())));
        assert_eq!(n.fired_count(&id), 0);
        assert_eq!(n.calls().len(), 1);
    }

    #[tokio::test]
    async fn permission_answer_is_configurable() {
        let n = RecordingNotifier::new();
        assert!(n.request_permission().await.unwrap());
        n.set_permission(false);
        assert!(!n.request_permission().await.unwrap());
    }
}
