//! The notification delivery seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docket_core::NotificationId;
use serde::Serialize;

use crate::errors::NotificationError;

/// What a notification shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    /// Heading.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl NotificationContent {
    /// Arbitrary content.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Due-soon reminder for a task.
    pub fn reminder(heading: &str, task_title: &str) -> Self {
        Self::new(heading, format!("Your task \"{task_title}\" is due soon"))
    }

    /// Overdue alert for a task.
    pub fn overdue(heading: &str, task_title: &str) -> Self {
        Self::new(heading, format!("Your task \"{task_title}\" is now overdue"))
    }
}

/// Local notification delivery.
///
/// Scheduling under an ID that is already pending replaces it. Cancelling an
/// unknown ID is not an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Ask for permission to post notifications. `Ok(false)` means denied.
    async fn request_permission(&self) -> Result<bool, NotificationError>;

    /// Deliver `content` once at `fire_at`.
    async fn schedule_one_shot(
        &self,
        id: &NotificationId,
        fire_at: DateTime<Utc>,
        content: &NotificationContent,
    ) -> Result<(), NotificationError>;

    /// Withdraw a pending notification.
    async fn cancel(&self, id: &NotificationId) -> Result<(), NotificationError>;

    /// Deliver `content` now.
    async fn fire_immediately(
        &self,
        id: &NotificationId,
        content: &NotificationContent,
    ) -> Result<(), NotificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_text() {
        let c = NotificationContent::reminder("Task Reminder", "Pay rent");
        assert_eq!(c.title, "Task Reminder");
        assert_eq!(c.body, "Your task \"Pay rent\" is due soon");
    }

    #[test]
    fn overdue_text() {
        let c = NotificationContent::overdue("Task Overdue", "Pay rent");
        assert_eq!(c.title, "Task Overdue");
        assert_eq!(c.body, "Your task \"Pay rent\" is now overdue");
    }
}
