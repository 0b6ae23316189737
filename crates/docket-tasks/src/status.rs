//! Status rules.
//!
//! Manual changes may move a task between any two statuses. The only
//! automatic change is open (pending / in progress) → overdue once the due
//! date has passed. Completed and overdue tasks are never changed
//! automatically.

use chrono::{DateTime, Utc};
use docket_core::TaskId;
use serde::{Deserialize, Serialize};

use crate::types::{Task, TaskStatus};

/// Who caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOrigin {
    /// An explicit command.
    Manual,
    /// The periodic overdue sweep.
    Automatic,
}

/// A status change that was applied to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    /// Affected task.
    pub task_id: TaskId,
    /// Status before.
    pub from: TaskStatus,
    /// Status after.
    pub to: TaskStatus,
    /// Who caused it.
    pub origin: TransitionOrigin,
}

impl StatusTransition {
    /// Transition between two snapshots of the same task, if the status moved.
    pub fn between(before: &Task, after: &Task, origin: TransitionOrigin) -> Option<Self> {
        (before.status != after.status).then(|| Self {
            task_id: after.id.clone(),
            from: before.status,
            to: after.status,
            origin,
        })
    }
}

/// Status the task should have at `now` if automatic rules apply.
///
/// Returns `Some(Overdue)` only for an open task whose due date is strictly
/// before `now`. Undated, completed, and already-overdue tasks yield `None`.
pub fn derive_overdue(task: &Task, now: DateTime<Utc>) -> Option<TaskStatus> {
    (task.status.is_open() && task.is_past_due(now)).then_some(TaskStatus::Overdue)
}

/// Target of the completion toggle.
///
/// Completed goes back to pending; every other status goes to completed.
pub fn toggle_target(status: TaskStatus) -> TaskStatus {
    match status {
        TaskStatus::Completed => TaskStatus::Pending,
        TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Overdue => {
            TaskStatus::Completed
        }
    }
}
