//! Persistence collaborator.
//!
//! The store loads every task once at startup and afterwards writes
//! [`SaveBatch`]es. A batch is all-or-nothing; when `save_batch` returns an
//! error nothing from that batch may be visible on the next `load_all`.

mod memory;
pub mod migrations;
mod sqlite;

pub use memory::MemoryPersistence;
pub use sqlite::SqlitePersistence;

use docket_core::TaskId;

use crate::errors::PersistenceError;
use crate::types::Task;

/// Durable storage for tasks.
pub trait TaskPersistence: Send + Sync {
    /// Every stored task, in no particular order.
    fn load_all(&self) -> Result<Vec<Task>, PersistenceError>;

    /// Apply upserts and deletes atomically.
    fn save_batch(&self, batch: &SaveBatch) -> Result<(), PersistenceError>;
}

/// A set of writes applied as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveBatch {
    /// Tasks to insert or replace.
    pub upserts: Vec<Task>,
    /// Task IDs to remove.
    pub deletes: Vec<TaskId>,
}

impl SaveBatch {
    /// Batch holding one upsert.
    pub fn upsert(task: Task) -> Self {
        Self {
            upserts: vec![task],
            deletes: Vec::new(),
        }
    }

    /// Batch holding one delete.
    pub fn delete(id: TaskId) -> Self {
        Self {
            upserts: Vec::new(),
            deletes: vec![id],
        }
    }

    /// Whether the batch writes nothing.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Number of rows touched.
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }
}
