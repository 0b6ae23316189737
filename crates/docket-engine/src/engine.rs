//! The task engine: every command a front end can issue.
//!
//! Commands go through the store's commit hooks so reminder side effects
//! are ordered with the mutation that caused them. After each commit the
//! live view is re-derived and an [`EngineEvent`] is broadcast.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docket_core::{Clock, TaskId};
use docket_reminders::{DeliveryFailure, Notifier, ReminderAction, ReminderScheduler};
use docket_tasks::{
    Category, Result, Task, TaskChange, TaskCreateParams, TaskPersistence, TaskQuery, TaskStatus,
    TaskStore, TaskUpdateParams, TransitionOrigin, toggle_target,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventEmitter};
use crate::reconciler::{self, ReconcileReport, ReconcilerHandle};
use crate::view::LiveView;

/// State shared by the engine and its reconciler loop.
#[derive(Debug)]
pub(crate) struct EngineCore {
    pub(crate) store: TaskStore,
    pub(crate) scheduler: ReminderScheduler,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: EventEmitter,
    pub(crate) view: LiveView,
    pub(crate) config: EngineConfig,
}

impl EngineCore {
    /// Bring reminders and alerts in line with one committed change.
    ///
    /// Runs inside the store's commit hook. Returns whether an overdue alert
    /// was raised.
    pub(crate) fn apply_side_effects(
        &self,
        change: &TaskChange,
        origin: TransitionOrigin,
        now: DateTime<Utc>,
    ) -> bool {
        match change {
            TaskChange::Created(task) => {
                let _ = self.scheduler.sync_reminder(task, now);
                false
            }
            TaskChange::Deleted(task) => {
                self.scheduler.forget(&task.id);
                false
            }
            TaskChange::Updated { before, after } => {
                let mut alerted = false;
                if after.status == TaskStatus::Overdue {
                    if before.status != TaskStatus::Overdue && origin == TransitionOrigin::Automatic
                    {
                        alerted = self.scheduler.raise_overdue_alert(after);
                    }
                } else {
                    self.scheduler.rearm_overdue_alert(&after.id);
                }

                if after.status == TaskStatus::Completed {
                    if before.status != TaskStatus::Completed {
                        self.scheduler.cancel_reminder(&after.id);
                    }
                } else if reminder_inputs_changed(before, after) {
                    let _ = self.scheduler.sync_reminder(after, now);
                }
                alerted
            }
        }
    }

    fn publish(&self, event: EngineEvent) {
        self.view.refresh(&self.store);
        let _ = self.events.emit(event);
    }
}

/// Fields a reminder depends on.
fn reminder_inputs_changed(before: &Task, after: &Task) -> bool {
    before.due_date != after.due_date
        || before.schedule_time_enabled != after.schedule_time_enabled
        || before.title != after.title
        || before.status != after.status
}

/// Commands over the task set, with reminders, live view, and reconciler.
///
/// Must be created inside a tokio runtime.
pub struct TaskEngine {
    core: Arc<EngineCore>,
    reconciler: Mutex<Option<ReconcilerHandle>>,
}

impl std::fmt::Debug for TaskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEngine")
            .field("tasks", &self.core.store.len())
            .field("reconciler_running", &self.is_reconciler_running())
            .finish_non_exhaustive()
    }
}

impl TaskEngine {
    /// Load the task set and wire up reminders.
    pub fn new(
        persistence: Arc<dyn TaskPersistence>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self> {
        let store = TaskStore::open(persistence, Arc::clone(&clock))?;
        let scheduler = ReminderScheduler::new(notifier, config.reminders.clone());
        let core = Arc::new(EngineCore {
            store,
            scheduler,
            clock,
            events: EventEmitter::new(),
            view: LiveView::new(),
            config,
        });
        core.view.refresh(&core.store);
        Ok(Self {
            core,
            reconciler: Mutex::new(None),
        })
    }

    /// Ask for notification permission and, if granted, schedule reminders
    /// for every eligible task. Returns whether reminders are active.
    pub async fn initialize(&self) -> bool {
        let active = self.core.scheduler.request_permission().await;
        if active {
            let now = self.core.clock.now();
            let mut scheduled = 0_usize;
            self.core.store.for_each_exclusive(|task| {
                if let ReminderAction::Scheduled(_) = self.core.scheduler.sync_reminder(task, now) {
                    scheduled += 1;
                }
            });
            info!(scheduled, "reminders scheduled for existing tasks");
        }
        active
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Tasks matching `search_text` and `category`, in display order.
    pub fn list_filtered_tasks(&self, search_text: &str, category: Option<Category>) -> Vec<Task> {
        self.core.store.query(&TaskQuery::new(search_text, category))
    }

    /// Snapshot of one task.
    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.core.store.get(id)
    }

    /// Replace the live view's query.
    pub fn set_query(&self, query: TaskQuery) {
        self.core.view.set_query(query, &self.core.store);
    }

    /// The live view's query.
    pub fn query(&self) -> TaskQuery {
        self.core.view.query()
    }

    /// Tasks in the live view.
    pub fn visible_tasks(&self) -> Vec<Task> {
        self.core.view.tasks()
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.core.events.subscribe()
    }

    /// Subscribe to notification delivery failures.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<DeliveryFailure> {
        self.core.scheduler.subscribe_failures()
    }

    /// The reminder scheduler.
    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.core.scheduler
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task and schedule its reminder.
    pub fn create_task(&self, params: &TaskCreateParams) -> Result<Task> {
        let core = &self.core;
        let now = core.clock.now();
        let task = core.store.create_with(params, |change| {
            let _ = core.apply_side_effects(change, TransitionOrigin::Manual, now);
        })?;
        core.publish(EngineEvent::TaskCreated { task: task.clone() });
        Ok(task)
    }

    /// Apply a partial update.
    pub fn update_task(&self, id: &TaskId, params: &TaskUpdateParams) -> Result<Task> {
        let core = &self.core;
        let now = core.clock.now();
        let mut transition = None;
        let task = core.store.update_with(id, params, |change| {
            transition = change.status_transition(TransitionOrigin::Manual);
            let _ = core.apply_side_effects(change, TransitionOrigin::Manual, now);
        })?;
        core.publish(EngineEvent::TaskUpdated {
            task: task.clone(),
            transition,
        });
        Ok(task)
    }

    /// Delete a task, cancelling its reminder and alert.
    pub fn delete_task(&self, id: &TaskId) -> Result<()> {
        let core = &self.core;
        let now = core.clock.now();
        let task = core.store.delete_with(id, |change| {
            let _ = core.apply_side_effects(change, TransitionOrigin::Manual, now);
        })?;
        core.publish(EngineEvent::TaskDeleted { task });
        Ok(())
    }

    /// Set a task's status. Every target is allowed.
    pub fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task> {
        self.update_task(id, &TaskUpdateParams::status(status))
    }

    /// Completed becomes Pending; anything else becomes Completed.
    pub fn toggle_task_completion(&self, id: &TaskId) -> Result<Task> {
        let core = &self.core;
        let now = core.clock.now();
        let mut transition = None;
        let task = core.store.edit_with(
            id,
            |task| {
                task.status = toggle_target(task.status);
                Ok(())
            },
            |change| {
                transition = change.status_transition(TransitionOrigin::Manual);
                let _ = core.apply_side_effects(change, TransitionOrigin::Manual, now);
            },
        )?;
        core.publish(EngineEvent::TaskUpdated {
            task: task.clone(),
            transition,
        });
        Ok(task)
    }

    /// Schedule the delivery self-test. Returns when it will fire.
    pub fn schedule_test_notification(&self) -> DateTime<Utc> {
        self.core.scheduler.schedule_test_reminder(self.core.clock.now())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reconciler
    // ─────────────────────────────────────────────────────────────────────

    /// Run one reconcile tick now.
    pub fn run_reconcile_tick(&self) -> Result<ReconcileReport> {
        reconciler::reconcile_once(&self.core)
    }

    /// Start the periodic reconciler. Returns `false` if already running.
    pub fn start_reconciler(&self) -> bool {
        let mut slot = self.reconciler.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        *slot = Some(ReconcilerHandle::spawn(
            Arc::clone(&self.core),
            self.core.config.reconcile_interval,
            self.core.config.run_on_start,
        ));
        true
    }

    /// Stop the reconciler and wait for it. Returns the ticks it ran, or
    /// `None` if it was not running.
    pub async fn stop_reconciler(&self) -> Option<u64> {
        let handle = self.reconciler.lock().take()?;
        Some(handle.stop().await)
    }

    /// Whether the reconciler loop is running.
    pub fn is_reconciler_running(&self) -> bool {
        self.reconciler
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait until queued notifier calls have been made.
    pub async fn flush(&self) {
        self.core.scheduler.flush().await;
    }

    /// Stop the reconciler and drain queued notifier calls.
    pub async fn shutdown(&self) {
        let _ = self.stop_reconciler().await;
        self.flush().await;
        info!("engine shut down");
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> Arc<EngineCore> {
        Arc::clone(&self.core)
    }
}

impl Drop for TaskEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.reconciler.get_mut().as_ref() {
            handle.cancel();
        }
    }
}
