//! Reminder and overdue alert scheduling.
//!
//! Bookkeeping (which task has a live reminder, which task has already been
//! alerted) is updated synchronously so callers can run it inside the task
//! store's commit hook. The actual notifier calls are queued on an unbounded
//! channel and executed in order by a single dispatcher task, so a cancel is
//! always delivered before the schedule that replaces it and callers never
//! wait on the notifier.
//!
//! Delivery errors are logged and broadcast as [`DeliveryFailure`]s. They
//! never feed back into task state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use docket_core::{NotificationId, TaskId};
use docket_tasks::Task;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::errors::NotificationError;
use crate::notifier::{NotificationContent, Notifier};

/// ID of the delivery self-test notification.
pub const TEST_NOTIFICATION_ID: &str = "docket-test-notification";

/// How far out the self-test notification fires.
const TEST_NOTIFICATION_DELAY_SECS: i64 = 120;

/// Capacity of the failure broadcast channel.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderConfig {
    /// Whether reminders and alerts are scheduled at all.
    pub enabled: bool,
    /// How long before the due date the reminder fires.
    pub lead_time: Duration,
    /// Heading of due-soon reminders.
    pub reminder_title: String,
    /// Heading of overdue alerts.
    pub overdue_title: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_time: Duration::hours(1),
            reminder_title: "Task Reminder".to_string(),
            overdue_title: "Task Overdue".to_string(),
        }
    }
}

/// Which notifier call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOperation {
    /// `schedule_one_shot`.
    Schedule,
    /// `cancel`.
    Cancel,
    /// `fire_immediately`.
    FireImmediately,
}

/// A notifier call that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Notification the call was for.
    pub notification_id: NotificationId,
    /// The failed operation.
    pub operation: DeliveryOperation,
    /// Why it failed.
    pub error: NotificationError,
}

/// What [`ReminderScheduler::sync_reminder`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    /// A reminder was (re)scheduled for this instant.
    Scheduled(DateTime<Utc>),
    /// A live reminder was cancelled.
    Cancelled,
    /// Nothing to do.
    Unchanged,
}

enum Command {
    Schedule {
        id: NotificationId,
        fire_at: DateTime<Utc>,
        content: NotificationContent,
    },
    Cancel {
        id: NotificationId,
    },
    Fire {
        id: NotificationId,
        content: NotificationContent,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct State {
    /// Reminder fire time per task, for reminders believed to be pending.
    reminders: HashMap<TaskId, DateTime<Utc>>,
    /// Tasks whose overdue alert has been raised and not re-armed.
    alerted: HashSet<TaskId>,
}

/// Keeps at most one reminder and one overdue alert per task.
///
/// Must be created inside a tokio runtime (it spawns its dispatcher).
pub struct ReminderScheduler {
    config: ReminderConfig,
    active: AtomicBool,
    state: Mutex<State>,
    commands: mpsc::UnboundedSender<Command>,
    failures: broadcast::Sender<DeliveryFailure>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("config", &self.config)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl ReminderScheduler {
    /// Create a scheduler and spawn its dispatcher.
    pub fn new(notifier: Arc<dyn Notifier>, config: ReminderConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        let _ = tokio::spawn(run_dispatcher(rx, Arc::clone(&notifier), failures.clone()));

        Self {
            active: AtomicBool::new(config.enabled),
            config,
            state: Mutex::new(State::default()),
            commands: tx,
            failures,
            notifier,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Whether scheduling is currently on.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Receive delivery failure reports.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<DeliveryFailure> {
        self.failures.subscribe()
    }

    /// Ask the notifier for permission.
    ///
    /// A denial (or an error) switches scheduling off. Returns whether
    /// scheduling is on afterwards.
    pub async fn request_permission(&self) -> bool {
        match self.notifier.request_permission().await {
            Ok(true) => {
                info!("notification permission granted");
                self.is_active()
            }
            Ok(false) => {
                warn!("notification permission denied, reminders disabled");
                self.active.store(false, Ordering::SeqCst);
                false
            }
            Err(error) => {
                warn!(%error, "notification permission request failed, reminders disabled");
                self.active.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Reminder fire time for a task whose state is `task`, if eligible at `now`.
    ///
    /// Eligible means: has a due date, schedules a time of day, is open, and
    /// `due_date - lead_time` is strictly in the future.
    pub fn reminder_time(&self, task: &Task, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !task.schedule_time_enabled || !task.status.is_open() {
            return None;
        }
        let fire_at = task.due_date? - self.config.lead_time;
        (fire_at > now).then_some(fire_at)
    }

    /// Bring the task's reminder in line with its current state.
    ///
    /// An eligible task gets its reminder replaced (cancel, then schedule).
    /// An ineligible task has any live reminder cancelled.
    pub fn sync_reminder(&self, task: &Task, now: DateTime<Utc>) -> ReminderAction {
        let id = NotificationId::reminder(&task.id);
        let mut state = self.state.lock();

        let target = if self.is_active() {
            self.reminder_time(task, now)
        } else {
            None
        };

        let Some(fire_at) = target else {
            if state.reminders.remove(&task.id).is_none() {
                return ReminderAction::Unchanged;
            }
            self.send(Command::Cancel { id });
            debug!(task_id = %task.id, "reminder cancelled, task no longer eligible");
            return ReminderAction::Cancelled;
        };

        let content = NotificationContent::reminder(&self.config.reminder_title, &task.title);
        self.send(Command::Cancel { id: id.clone() });
        self.send(Command::Schedule {
            id,
            fire_at,
            content,
        });
        let _ = state.reminders.insert(task.id.clone(), fire_at);
        debug!(task_id = %task.id, %fire_at, "reminder scheduled");
        ReminderAction::Scheduled(fire_at)
    }

    /// Cancel the task's reminder unconditionally.
    pub fn cancel_reminder(&self, task_id: &TaskId) {
        let mut state = self.state.lock();
        let _ = state.reminders.remove(task_id);
        self.send(Command::Cancel {
            id: NotificationId::reminder(task_id),
        });
        debug!(task_id = %task_id, "reminder cancelled");
    }

    /// Raise the overdue alert for `task` unless it was already raised.
    ///
    /// Returns whether an alert was queued.
    pub fn raise_overdue_alert(&self, task: &Task) -> bool {
        if !self.is_active() {
            return false;
        }
        let mut state = self.state.lock();
        if !state.alerted.insert(task.id.clone()) {
            return false;
        }
        self.send(Command::Fire {
            id: NotificationId::overdue(&task.id),
            content: NotificationContent::overdue(&self.config.overdue_title, &task.title),
        });
        info!(task_id = %task.id, "overdue alert raised");
        true
    }

    /// Allow the overdue alert to be raised again (task left overdue).
    pub fn rearm_overdue_alert(&self, task_id: &TaskId) {
        if self.state.lock().alerted.remove(task_id) {
            debug!(task_id = %task_id, "overdue alert re-armed");
        }
    }

    /// Drop everything known about a deleted task and cancel its
    /// notifications.
    pub fn forget(&self, task_id: &TaskId) {
        let mut state = self.state.lock();
        let _ = state.reminders.remove(task_id);
        let _ = state.alerted.remove(task_id);
        self.send(Command::Cancel {
            id: NotificationId::reminder(task_id),
        });
        self.send(Command::Cancel {
            id: NotificationId::overdue(task_id),
        });
        debug!(task_id = %task_id, "reminders forgotten");
    }

    /// Forget reminders whose fire time has passed. Returns how many.
    pub fn prune_fired(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        let before = state.reminders.len();
        state.reminders.retain(|_, fire_at| *fire_at > now);
        before - state.reminders.len()
    }

    /// Fire time of the task's live reminder.
    pub fn reminder_for(&self, task_id: &TaskId) -> Option<DateTime<Utc>> {
        self.state.lock().reminders.get(task_id).copied()
    }

    /// Every live reminder.
    pub fn live_reminders(&self) -> Vec<(TaskId, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .state
            .lock()
            .reminders
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Whether the task's overdue alert has been raised and not re-armed.
    pub fn has_alerted(&self, task_id: &TaskId) -> bool {
        self.state.lock().alerted.contains(task_id)
    }

    /// Schedule a test notification two minutes from `now`.
    ///
    /// Bypasses the enabled switch so delivery can be checked on its own.
    pub fn schedule_test_reminder(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let id = NotificationId::from(TEST_NOTIFICATION_ID);
        let fire_at = now + Duration::seconds(TEST_NOTIFICATION_DELAY_SECS);
        self.send(Command::Cancel { id: id.clone() });
        self.send(Command::Schedule {
            id,
            fire_at,
            content: NotificationContent::new(
                "Test Notification",
                "Notifications from Docket are working",
            ),
        });
        info!(%fire_at, "test notification scheduled");
        fire_at
    }

    /// Wait until every command queued so far has reached the notifier.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("reminder dispatcher is gone, dropping command");
        }
    }
}

async fn run_dispatcher(
    mut commands: mpsc::UnboundedReceiver<Command>,
    notifier: Arc<dyn Notifier>,
    failures: broadcast::Sender<DeliveryFailure>,
) {
    while let Some(command) = commands.recv().await {
        let (id, operation, result) = match command {
            Command::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
            Command::Schedule {
                id,
                fire_at,
                content,
            } => {
                let result = notifier.schedule_one_shot(&id, fire_at, &content).await;
                (id, DeliveryOperation::Schedule, result)
            }
            Command::Cancel { id } => {
                let result = notifier.cancel(&id).await;
                (id, DeliveryOperation::Cancel, result)
            }
            Command::Fire { id, content } => {
                let result = notifier.fire_immediately(&id, &content).await;
                (id, DeliveryOperation::FireImmediately, result)
            }
        };

        if let Err(error) = result {
            warn!(notification_id = %id, ?operation, %error, "notification delivery failed");
            let _ = failures.send(DeliveryFailure {
                notification_id: id,
                operation,
                error,
            });
        }
    }
    debug!("reminder dispatcher stopped");
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::providers::{NotifierCall, RecordingNotifier};
    use chrono::TimeZone;
    use docket_tasks::{Category, TaskPriority, TaskStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn task(id: &str, due_in: Option<Duration>, status: TaskStatus, timed: bool) -> Task {
        Task {
            id: TaskId::from(id),
            title: "Pay rent".into(),
            description: String::new(),
            created_at: now() - Duration::days(1),
            due_date: due_in.map(|d| now() + d),
            priority: TaskPriority::Medium,
            status,
            category: Category::Personal,
            location: None,
            schedule_time_enabled: timed,
        }
    }

    fn setup() -> (ReminderScheduler, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(notifier.clone(), ReminderConfig::default());
        (scheduler, notifier)
    }

    #[tokio::test]
    async fn eligible_task_gets_reminder_one_hour_before() {
        let (scheduler, notifier) = setup();
        let t = task("t1", Some(Duration::hours(3)), TaskStatus::InProgress, true);

        let action = scheduler.sync_reminder(&t, now());
        scheduler.flush().await;

        let expected = now() + Duration::hours(2);
        assert_eq!(action, ReminderAction::Scheduled(expected));
        assert_eq!(scheduler.reminder_for(&t.id), Some(expected));
        assert_eq!(notifier.pending()[&NotificationId::from("t1")], expected);
        let content = notifier.pending_content(&NotificationId::from("t1")).unwrap();
        assert_eq!(content.title, "Task Reminder");
        assert_eq!(content.body, "Your task \"Pay rent\" is due soon");
    }

    #[tokio::test]
    async fn schedule_is_preceded_by_cancel() {
        let (scheduler, notifier) = setup();
        let t = task("t1", Some(Duration::hours(3)), TaskStatus::Pending, true);
        scheduler.sync_reminder(&t, now());
        scheduler.flush().await;

        let calls = notifier.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], NotifierCall::Cancel { id: NotificationId::from("t1") });
        assert!(matches!(calls[1], NotifierCall::Schedule { .. }));
    }

    #[tokio::test]
    async fn rescheduling_keeps_single_trigger() {
        let (scheduler, notifier) = setup();
        let mut t = task("t1", Some(Duration::hours(3)), TaskStatus::Pending, true);
        for hours in [3, 5, 4, 10] {
            t.due_date = Some(now() + Duration::hours(hours));
            scheduler.sync_reminder(&t, now());
        }
        scheduler.flush().await;

        assert_eq!(notifier.pending().len(), 1);
        assert_eq!(
            notifier.pending()[&NotificationId::from("t1")],
            now() + Duration::hours(9)
        );
        assert_eq!(scheduler.live_reminders().len(), 1);
    }

    #[tokio::test]
    async fn reminder_in_the_past_is_not_scheduled() {
        let (scheduler, notifier) = setup();
        // Due in 30 minutes: reminder instant already passed.
        let t = task("t1", Some(Duration::minutes(30)), TaskStatus::Pending, true);
        assert_eq!(scheduler.sync_reminder(&t, now()), ReminderAction::Unchanged);

        // Exactly now is not in the future either.
        let t = task("t2", Some(Duration::hours(1)), TaskStatus::Pending, true);
        assert_eq!(scheduler.sync_reminder(&t, now()), ReminderAction::Unchanged);

        scheduler.flush().await;
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn ineligible_tasks_are_not_scheduled() {
        let (scheduler, notifier) = setup();
        let day = Some(Duration::days(1));
        for t in [
            task("undated", None, TaskStatus::Pending, true),
            task("untimed", day, TaskStatus::Pending, false),
            task("done", day, TaskStatus::Completed, true),
            task("late", day, TaskStatus::Overdue, true),
        ] {
            assert_eq!(scheduler.sync_reminder(&t, now()), ReminderAction::Unchanged);
        }
        scheduler.flush().await;
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn becoming_ineligible_cancels() {
        let (scheduler, notifier) = setup();
        let mut t = task("t1", Some(Duration::hours(3)), TaskStatus::Pending, true);
        scheduler.sync_reminder(&t, now());

        t.status = TaskStatus::Completed;
        assert_eq!(scheduler.sync_reminder(&t, now()), ReminderAction::Cancelled);
        scheduler.flush().await;

        assert!(notifier.pending().is_empty());
        assert!(scheduler.reminder_for(&t.id).is_none());
    }

    #[tokio::test]
    async fn cancel_reminder_always_reaches_notifier() {
        let (scheduler, notifier) = setup();
        scheduler.cancel_reminder(&TaskId::from("unknown"));
        scheduler.flush().await;
        assert_eq!(
            notifier.calls(),
            vec![NotifierCall::Cancel { id: NotificationId::from("unknown") }]
        );
    }

    #[tokio::test]
    async fn overdue_alert_raised_once_until_rearmed() {
        let (scheduler, notifier) = setup();
        let t = task("t1", Some(-Duration::seconds(1)), TaskStatus::Overdue, true);
        let alert_id = NotificationId::overdue(&t.id);

        assert!(scheduler.raise_overdue_alert(&t));
        assert!(!scheduler.raise_overdue_alert(&t));
        scheduler.flush().await;
        assert_eq!(notifier.fired_count(&alert_id), 1);
        assert!(scheduler.has_alerted(&t.id));

        scheduler.rearm_overdue_alert(&t.id);
        assert!(scheduler.raise_overdue_alert(&t));
        scheduler.flush().await;
        assert_eq!(notifier.fired_count(&alert_id), 2);

        let (_, content) = &notifier.fired()[0];
        assert_eq!(content.title, "Task Overdue");
        assert_eq!(content.body, "Your task \"Pay rent\" is now overdue");
    }

    #[tokio::test]
    async fn alert_and_reminder_use_distinct_ids() {
        let (scheduler, notifier) = setup();
        let t = task("t1", Some(Duration::hours(3)), TaskStatus::Pending, true);
        scheduler.sync_reminder(&t, now());
        scheduler.raise_overdue_alert(&t);
        scheduler.flush().await;

        assert!(notifier.pending().contains_key(&NotificationId::from("t1")));
        assert_eq!(notifier.fired()[0].0, NotificationId::from("t1-overdue"));
    }

    #[tokio::test]
    async fn forget_cancels_everything() {
        let (scheduler, notifier) = setup();
        let t = task("t1", Some(Duration::hours(3)), TaskStatus::Pending, true);
        scheduler.sync_reminder(&t, now());
        scheduler.raise_overdue_alert(&t);
        scheduler.forget(&t.id);
        scheduler.flush().await;

        assert!(notifier.pending().is_empty());
        assert!(scheduler.reminder_for(&t.id).is_none());
        assert!(!scheduler.has_alerted(&t.id));
    }

    #[tokio::test]
    async fn disabled_scheduler_schedules_nothing() {
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(
            notifier.clone(),
            ReminderConfig {
                enabled: false,
                ..ReminderConfig::default()
            },
        );
        let t = task("t1", Some(Duration::hours(3)), TaskStatus::Pending, true);
        assert_eq!(scheduler.sync_reminder(&t, now()), ReminderAction::Unchanged);
        assert!(!scheduler.raise_overdue_alert(&t));
        scheduler.flush().await;
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn permission_denied_disables() {
        let (scheduler, notifier) = setup();
        notifier.set_permission(false);
        assert!(!scheduler.request_permission().await);
        assert!(!scheduler.is_active());
    }

    #[tokio::test]
    async fn permission_granted_keeps_enabled() {
        let (scheduler, _notifier) = setup();
        assert!(scheduler.request_permission().await);
        assert!(scheduler.is_active());
    }

    #[tokio::test]
    async fn delivery_failure_is_broadcast_not_fatal() {
        let (scheduler, notifier) = setup();
        let mut failures = scheduler.subscribe_failures();
        notifier.fail_with(Some(NotificationError::Delivery("quota exceeded".into())));

        let t = task("t1", Some(Duration::hours(3)), TaskStatus::Pending, true);
        let action = scheduler.sync_reminder(&t, now());
        scheduler.flush().await;

        assert!(matches!(action, ReminderAction::Scheduled(_)));
        let first = failures.recv().await.unwrap();
        assert_eq!(first.operation, DeliveryOperation::Cancel);
        let second = failures.recv().await.unwrap();
        assert_eq!(second.operation, DeliveryOperation::Schedule);
        assert_eq!(second.error, NotificationError::Delivery("quota exceeded".into()));
    }

    #[tokio::test]
    async fn delivery_failure_is_logged_as_warning() {
        let (logs, _guard) = docket_core::logging::capture_logs();
        let (scheduler, notifier) = setup();
        notifier.fail_with(Some(NotificationError::Unavailable("offline".into())));

        let t = task("t1", Some(Duration::hours(-1)), TaskStatus::Overdue, false);
        assert!(scheduler.raise_overdue_alert(&t));
        scheduler.flush().await;

        let warnings = logs.matching_at(tracing::Level::WARN, "notification delivery failed");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field("notification_id"), Some("t1-overdue"));
        assert!(logs.has_event(tracing::Level::INFO, "overdue alert raised"));
    }

    #[tokio::test]
    async fn prune_fired_drops_past_reminders() {
        let (scheduler, _notifier) = setup();
        scheduler.sync_reminder(
            &task("soon", Some(Duration::hours(2)), TaskStatus::Pending, true),
            now(),
        );
        scheduler.sync_reminder(
            &task("later", Some(Duration::hours(5)), TaskStatus::Pending, true),
            now(),
        );
        assert_eq!(scheduler.prune_fired(now() + Duration::hours(1)), 1);
        let live = scheduler.live_reminders();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, TaskId::from("later"));
    }

    #[tokio::test]
    async fn test_reminder_two_minutes_out() {
        let (scheduler, notifier) = setup();
        let fire_at = scheduler.schedule_test_reminder(now());
        scheduler.flush().await;
        assert_eq!(fire_at, now() + Duration::minutes(2));
        assert_eq!(
            notifier.pending()[&NotificationId::from(TEST_NOTIFICATION_ID)],
            fire_at
        );
    }
}
