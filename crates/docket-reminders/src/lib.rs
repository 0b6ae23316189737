//! # docket-reminders
//!
//! Time-based reminders and overdue alerts for tasks.
//!
//! - [`Notifier`]: the delivery seam (permission, one-shot, cancel, fire now)
//! - [`ReminderScheduler`]: at most one reminder and one overdue alert per
//!   task, with ordered fire-and-forget delivery
//! - [`providers`]: a timer-based local notifier and a recording fake

#![deny(unsafe_code)]

pub mod errors;
pub mod notifier;
pub mod providers;
pub mod scheduler;

pub use errors::NotificationError;
pub use notifier::{NotificationContent, Notifier};
pub use scheduler::{
    DeliveryFailure, DeliveryOperation, ReminderAction, ReminderConfig, ReminderScheduler,
    TEST_NOTIFICATION_ID,
};
