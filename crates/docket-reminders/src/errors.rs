//! Notification delivery errors.
//!
//! Delivery errors never abort a task mutation. The scheduler logs them and
//! broadcasts them as [`crate::DeliveryFailure`] reports.

use thiserror::Error;

/// Errors from the notification delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// The user has not granted notification permission.
    #[error("notification permission denied")]
    PermissionDenied,

    /// The collaborator accepted the request but could not deliver it.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The collaborator is not reachable.
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}
