//! Broadcast-based change notifications for engine consumers.

use std::sync::atomic::{AtomicU64, Ordering};

use docket_tasks::{StatusTransition, Task};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::reconciler::ReconcileReport;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Something that changed the task set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A task was created.
    TaskCreated {
        /// The new task.
        task: Task,
    },
    /// A task was edited or changed status by hand.
    TaskUpdated {
        /// The task after the change.
        task: Task,
        /// The status change, if the status moved.
        transition: Option<StatusTransition>,
    },
    /// A task was deleted.
    TaskDeleted {
        /// The task's last snapshot.
        task: Task,
    },
    /// A reconcile tick changed at least one task.
    Reconciled {
        /// What the tick did.
        report: ReconcileReport,
    },
}

impl EngineEvent {
    /// Stable name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskCreated { .. } => "task_created",
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskDeleted { .. } => "task_deleted",
            Self::Reconciled { .. } => "reconciled",
        }
    }
}

/// Broadcast-based event emitter.
///
/// Non-blocking: `emit` never awaits. Slow receivers lag rather than
/// blocking the engine.
pub struct EventEmitter {
    tx: broadcast::Sender<EngineEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create an emitter with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Returns how many received it.
    pub fn emit(&self, event: EngineEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events emitted.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscriber_count())
            .field("emitted", &self.emit_count())
            .finish()
    }
}
