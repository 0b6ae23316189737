//! # docket-core
//!
//! Foundation types shared by every Docket crate:
//!
//! - **Branded IDs**: [`TaskId`] and [`NotificationId`] as newtypes for type safety
//! - **Clock**: the [`Clock`] seam so time-driven logic can run against a fake clock
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod clock;
pub mod ids;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{NotificationId, TaskId};
