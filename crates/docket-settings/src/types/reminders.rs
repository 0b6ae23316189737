//! Reminder scheduling settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reminder and overdue alert settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReminderSettings {
    /// Master switch for scheduling reminders and overdue alerts.
    pub enabled: bool,
    /// How long before the due date the reminder fires.
    pub lead_time_secs: u64,
    /// Notification title for due-soon reminders.
    pub reminder_title: String,
    /// Notification title for overdue alerts.
    pub overdue_title: String,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_time_secs: 3600,
            reminder_title: "Task Reminder".to_string(),
            overdue_title: "Task Overdue".to_string(),
        }
    }
}

impl ReminderSettings {
    /// Lead time as a [`Duration`].
    pub fn lead_time(&self) -> Duration {
        Duration::from_secs(self.lead_time_secs)
    }
}
