//! [`Notifier`](crate::Notifier) implementations.
//!
//! - [`LocalNotifier`]: in-process timers, used by the daemon
//! - [`RecordingNotifier`]: records calls, used by tests

mod local;
mod recording;

pub use local::{DeliveredNotification, LocalNotifier};
pub use recording::{NotifierCall, RecordingNotifier};
