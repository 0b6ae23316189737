//! Periodic overdue sweep.
//!
//! Each tick reads the clock once, moves every open task whose due date has
//! passed to `Overdue` in one persisted batch, and raises the overdue alert
//! for each. The loop runs until its cancellation token fires; a failed tick
//! is logged and the next one runs on schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use docket_tasks::{StatusTransition, Task, TransitionOrigin, derive_overdue};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::EngineCore;
use crate::events::EngineEvent;

/// Shortest period the loop will run at.
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// The single clock reading the tick used.
    pub checked_at: DateTime<Utc>,
    /// Automatic transitions applied, in display order.
    pub transitions: Vec<StatusTransition>,
    /// Overdue alerts queued.
    pub alerts_raised: usize,
    /// Reminder records dropped because their fire time passed.
    pub reminders_pruned: usize,
}

impl ReconcileReport {
    /// Whether any task changed.
    pub fn changed(&self) -> bool {
        !self.transitions.is_empty()
    }
}

/// Run one sweep against `core`.
pub(crate) fn reconcile_once(core: &EngineCore) -> docket_tasks::Result<ReconcileReport> {
    let now = core.clock.now();
    let reminders_pruned = core.scheduler.prune_fired(now);

    let mut alerts_raised = 0;
    let changes = core.store.modify_batch(
        |task| derive_overdue(task, now).map(|status| Task { status, ..task.clone() }),
        |change| {
            if core.apply_side_effects(change, TransitionOrigin::Automatic, now) {
                alerts_raised += 1;
            }
        },
    )?;

    let report = ReconcileReport {
        checked_at: now,
        transitions: changes
            .iter()
            .filter_map(|change| change.status_transition(TransitionOrigin::Automatic))
            .collect(),
        alerts_raised,
        reminders_pruned,
    };

    if report.changed() {
        core.view.refresh(&core.store);
        info!(
            overdue = report.transitions.len(),
            alerts = report.alerts_raised,
            "reconcile tick marked tasks overdue"
        );
        let _ = core.events.emit(EngineEvent::Reconciled {
            report: report.clone(),
        });
    } else {
        debug!(pruned = reminders_pruned, "reconcile tick, nothing due");
    }
    Ok(report)
}

/// Sweep every `period` until `cancel` fires. Returns the number of ticks run.
///
/// The first tick runs immediately when `run_on_start` is set; otherwise the
/// first sweep happens one period in.
pub(crate) async fn run_reconciler(
    core: Arc<EngineCore>,
    period: Duration,
    run_on_start: bool,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = time::interval(period.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !run_on_start {
        let _ = ticker.tick().await;
    }

    let mut ticks = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                if let Err(error) = reconcile_once(&core) {
                    error!(%error, tick = ticks, "reconcile tick failed");
                }
            }
            () = cancel.cancelled() => {
                info!(ticks, "reconciler stopped");
                return ticks;
            }
        }
    }
}

/// A running reconciler loop.
#[derive(Debug)]
pub struct ReconcilerHandle {
    cancel: CancellationToken,
    join: JoinHandle<u64>,
}

impl ReconcilerHandle {
    pub(crate) fn spawn(core: Arc<EngineCore>, period: Duration, run_on_start: bool) -> Self {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(run_reconciler(core, period, run_on_start, cancel.clone()));
        info!(?period, run_on_start, "reconciler started");
        Self { cancel, join }
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Ask the loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the loop and wait for it. Returns the number of ticks it ran.
    pub async fn stop(self) -> u64 {
        self.cancel.cancel();
        self.join.await.unwrap_or_else(|error| {
            error!(%error, "reconciler task ended abnormally");
            0
        })
    }
}
