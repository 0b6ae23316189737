//! # docket-engine
//!
//! The command surface of Docket, tying the task store to reminders:
//!
//! - [`TaskEngine`]: create, edit, delete, status changes, filtered listing
//! - [`reconciler`]: the periodic sweep that marks past-due tasks overdue
//! - [`view`]: the live filtered view, re-derived after every change
//! - [`events`]: broadcast of [`EngineEvent`]s to front ends
//!
//! Every mutation commits through the store's exclusive lock, and its
//! reminder side effects run in the commit hook before the lock is released.

#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod events;
pub mod reconciler;
pub mod view;

pub use config::EngineConfig;
pub use engine::TaskEngine;
pub use events::{EngineEvent, EventEmitter};
pub use reconciler::{ReconcileReport, ReconcilerHandle};
pub use view::LiveView;
