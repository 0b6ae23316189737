//! Task error types.
//!
//! Task errors are **not** fail-silent: every mutation surfaces them
//! synchronously and leaves the store untouched.

use thiserror::Error;

/// Errors from the persistence collaborator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be turned back into a task.
    #[error("Corrupt task row {id}: {reason}")]
    Corrupt {
        /// ID of the offending row.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The backing store cannot be reached.
    #[error("Persistence unavailable: {0}")]
    Unavailable(String),

    /// Another process owns the database file.
    #[error("Database {0} is in use by another docket process")]
    InUse(String),
}

impl PersistenceError {
    /// Create a corrupt-row error.
    pub fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type (e.g., "Task").
        entity: &'static str,
        /// The ID that was looked up.
        id: String,
    },

    /// Validation failure.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The mutation could not be persisted; nothing was changed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl TaskError {
    /// Create a not-found error for a task.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.into(),
        }
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;
