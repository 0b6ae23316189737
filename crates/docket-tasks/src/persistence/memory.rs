//! In-memory persistence for tests and `--in-memory` runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use docket_core::TaskId;
use parking_lot::Mutex;

use super::{SaveBatch, TaskPersistence};
use crate::errors::PersistenceError;
use crate::types::Task;

/// Keeps "persisted" rows in a map. Can be told to fail the next save.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    rows: Mutex<HashMap<TaskId, Task>>,
    fail_next_save: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `tasks`.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let rows = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Make the next `save_batch` fail with [`PersistenceError::Unavailable`].
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Number of successful `save_batch` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of a stored row.
    pub fn row(&self, id: &TaskId) -> Option<Task> {
        self.rows.lock().get(id).cloned()
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

impl TaskPersistence for MemoryPersistence {
    fn load_all(&self) -> Result<Vec<Task>, PersistenceError> {
        Ok(self.rows.lock().values().cloned().collect())
    }

    fn save_batch(&self, batch: &SaveBatch) -> Result<(), PersistenceError> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("injected failure".into()));
        }
        let mut rows = self.rows.lock();
        for task in &batch.upserts {
            let _ = rows.insert(task.id.clone(), task.clone());
        }
        for id in &batch.deletes {
            let _ = rows.remove(id);
        }
        let _ = self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
