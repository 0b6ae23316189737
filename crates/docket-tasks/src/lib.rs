//! # docket-tasks
//!
//! The task model and everything that operates on it directly:
//!
//! - [`types`]: `Task`, its enums, and create/update parameters
//! - [`store`]: the serialized, persisted in-memory task set
//! - [`filter`]: search/category filtering and display ordering
//! - [`status`]: manual and automatic status rules
//! - [`display`]: labels and colors for presentation
//! - [`persistence`]: the storage trait plus `SQLite` and in-memory backends

#![deny(unsafe_code)]

pub mod display;
pub mod errors;
pub mod filter;
pub mod persistence;
pub mod status;
pub mod store;
pub mod types;

pub use errors::{PersistenceError, Result, TaskError};
pub use filter::{TaskQuery, compare_tasks, filter};
pub use persistence::{MemoryPersistence, SaveBatch, SqlitePersistence, TaskPersistence};
pub use status::{StatusTransition, TransitionOrigin, derive_overdue, toggle_target};
pub use store::{TaskChange, TaskStore};
pub use types::{
    Category, Task, TaskCreateParams, TaskLocation, TaskPriority, TaskStatus, TaskUpdateParams,
};
