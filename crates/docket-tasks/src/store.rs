//! The task store: single owner of the in-memory task set.
//!
//! Every mutation takes the write lock, checks, persists, and only then
//! commits to memory. A persistence error leaves memory exactly as it was.
//!
//! The `*_with` variants accept a commit hook that runs after the commit
//! while the write lock is still held. Side effects placed there (reminder
//! cancellation, alert bookkeeping) are ordered with the mutation that caused
//! them and cannot interleave with another mutation. Hooks must not call back
//! into the store.

use std::collections::HashMap;
use std::sync::Arc;

use docket_core::{Clock, TaskId};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::errors::{Result, TaskError};
use crate::filter::{self, TaskQuery, compare_tasks};
use crate::persistence::{SaveBatch, TaskPersistence};
use crate::status::{StatusTransition, TransitionOrigin};
use crate::types::{Task, TaskCreateParams, TaskUpdateParams, validate_title};

/// A committed change, handed to commit hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskChange {
    /// A new task.
    Created(Task),
    /// An existing task changed.
    Updated {
        /// Snapshot before the change.
        before: Task,
        /// Snapshot after the change.
        after: Task,
    },
    /// A task was removed.
    Deleted(Task),
}

impl TaskChange {
    /// ID of the affected task.
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Created(t) | Self::Deleted(t) | Self::Updated { after: t, .. } => &t.id,
        }
    }

    /// The task as it now exists, `None` after a delete.
    pub fn current(&self) -> Option<&Task> {
        match self {
            Self::Created(t) | Self::Updated { after: t, .. } => Some(t),
            Self::Deleted(_) => None,
        }
    }

    /// The task as it was, `None` for a create.
    pub fn previous(&self) -> Option<&Task> {
        match self {
            Self::Updated { before: t, .. } | Self::Deleted(t) => Some(t),
            Self::Created(_) => None,
        }
    }

    /// Status transition carried by an update, if the status moved.
    pub fn status_transition(&self, origin: TransitionOrigin) -> Option<StatusTransition> {
        match self {
            Self::Updated { before, after } => StatusTransition::between(before, after, origin),
            Self::Created(_) | Self::Deleted(_) => None,
        }
    }
}

/// In-memory task set backed by a persistence collaborator.
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    persistence: Arc<dyn TaskPersistence>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Load every task from `persistence`.
    pub fn open(persistence: Arc<dyn TaskPersistence>, clock: Arc<dyn Clock>) -> Result<Self> {
        let loaded = persistence.load_all()?;
        let tasks: HashMap<TaskId, Task> =
            loaded.into_iter().map(|t| (t.id.clone(), t)).collect();
        info!(count = tasks.len(), "task store opened");
        Ok(Self {
            tasks: RwLock::new(tasks),
            persistence,
            clock,
        })
    }

    /// The clock used for creation timestamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Snapshot of one task.
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().get(id).cloned()
    }

    /// Snapshot of every task, unordered.
    pub fn list(&self) -> Vec<Task> {
        self.tasks.read().values().cloned().collect()
    }

    /// Filtered, sorted snapshot taken under one read lock.
    pub fn query(&self, query: &TaskQuery) -> Vec<Task> {
        filter::filter(self.tasks.read().values(), query)
    }

    /// Visit every task while holding the write lock, in display order.
    ///
    /// No mutation can interleave with the visit. Used to bring side effects
    /// (reminders) in line with the whole set at once.
    pub fn for_each_exclusive<F>(&self, mut visit: F)
    where
        F: FnMut(&Task),
    {
        let tasks = self.tasks.write();
        let mut ordered: Vec<&Task> = tasks.values().collect();
        ordered.sort_by(|a, b| compare_tasks(a, b));
        for task in ordered {
            visit(task);
        }
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Whether the store holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task.
    pub fn create(&self, params: &TaskCreateParams) -> Result<Task> {
        self.create_with(params, |_| {})
    }

    /// Create a task and run `hook` before releasing the lock.
    pub fn create_with<H>(&self, params: &TaskCreateParams, hook: H) -> Result<Task>
    where
        H: FnOnce(&TaskChange),
    {
        let title = validate_title(&params.title)?;
        let task = Task {
            id: TaskId::new(),
            title,
            description: params.description.clone(),
            created_at: self.clock.now(),
            due_date: params.due_date,
            priority: params.priority.unwrap_or_default(),
            status: params.status.unwrap_or_default(),
            category: params.category.unwrap_or_default(),
            location: params.location.clone(),
            schedule_time_enabled: params.schedule_time_enabled,
        };

        let mut tasks = self.tasks.write();
        self.persistence
            .save_batch(&SaveBatch::upsert(task.clone()))?;
        let _ = tasks.insert(task.id.clone(), task.clone());

        info!(task_id = %task.id, status = %task.status, "task created");
        hook(&TaskChange::Created(task.clone()));
        Ok(task)
    }

    /// Apply a partial update.
    pub fn update(&self, id: &TaskId, params: &TaskUpdateParams) -> Result<Task> {
        self.update_with(id, params, |_| {})
    }

    /// Apply a partial update and run `hook` before releasing the lock.
    pub fn update_with<H>(&self, id: &TaskId, params: &TaskUpdateParams, hook: H) -> Result<Task>
    where
        H: FnOnce(&TaskChange),
    {
        self.edit_with(id, |task| params.apply_to(task), hook)
    }

    /// Edit a task in place through `edit`.
    ///
    /// `edit` sees a copy; the copy is persisted and committed only if `edit`
    /// succeeds. The ID and creation time cannot be changed.
    pub fn edit_with<E, H>(&self, id: &TaskId, edit: E, hook: H) -> Result<Task>
    where
        E: FnOnce(&mut Task) -> Result<()>,
        H: FnOnce(&TaskChange),
    {
        let mut tasks = self.tasks.write();
        let before = tasks
            .get(id)
            .cloned()
            .ok_or_else(|| TaskError::task_not_found(id.as_str()))?;

        let mut after = before.clone();
        edit(&mut after)?;
        after.id.clone_from(&before.id);
        after.created_at = before.created_at;

        self.persistence
            .save_batch(&SaveBatch::upsert(after.clone()))?;
        let _ = tasks.insert(id.clone(), after.clone());

        if before.status == after.status {
            debug!(task_id = %id, "task updated");
        } else {
            info!(task_id = %id, from = %before.status, to = %after.status, "task status changed");
        }
        hook(&TaskChange::Updated {
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    /// Delete a task, returning its last snapshot.
    pub fn delete(&self, id: &TaskId) -> Result<Task> {
        self.delete_with(id, |_| {})
    }

    /// Delete a task and run `hook` before releasing the lock.
    pub fn delete_with<H>(&self, id: &TaskId, hook: H) -> Result<Task>
    where
        H: FnOnce(&TaskChange),
    {
        let mut tasks = self.tasks.write();
        if !tasks.contains_key(id) {
            return Err(TaskError::task_not_found(id.as_str()));
        }

        self.persistence.save_batch(&SaveBatch::delete(id.clone()))?;
        let removed = tasks
            .remove(id)
            .ok_or_else(|| TaskError::task_not_found(id.as_str()))?;

        info!(task_id = %id, "task deleted");
        hook(&TaskChange::Deleted(removed.clone()));
        Ok(removed)
    }

    /// Rewrite many tasks as one persisted batch.
    ///
    /// `edit` is offered every task and returns a replacement for the ones
    /// that should change. All replacements are saved in a single batch; if
    /// that fails nothing is committed. `hook` then runs once per change,
    /// in display order, before the lock is released. Returns the changes.
    pub fn modify_batch<E, H>(&self, mut edit: E, mut hook: H) -> Result<Vec<TaskChange>>
    where
        E: FnMut(&Task) -> Option<Task>,
        H: FnMut(&TaskChange),
    {
        let mut tasks = self.tasks.write();

        let mut pairs: Vec<(Task, Task)> = tasks
            .values()
            .filter_map(|before| {
                edit(before).map(|mut after| {
                    after.id.clone_from(&before.id);
                    after.created_at = before.created_at;
                    (before.clone(), after)
                })
            })
            .filter(|(before, after)| before != after)
            .collect();
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        pairs.sort_by(|a, b| compare_tasks(&a.1, &b.1));

        let batch = SaveBatch {
            upserts: pairs.iter().map(|(_, after)| after.clone()).collect(),
            deletes: Vec::new(),
        };
        self.persistence.save_batch(&batch)?;

        let changes: Vec<TaskChange> = pairs
            .into_iter()
            .map(|(before, after)| {
                let _ = tasks.insert(after.id.clone(), after.clone());
                TaskChange::Updated { before, after }
            })
            .collect();
        info!(count = changes.len(), "task batch committed");
        for change in &changes {
            hook(change);
        }
        Ok(changes)
    }
}
