//! The reconciler batch racing user commands on other threads.

#![allow(unused_results)]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use docket_core::{Clock, ManualClock, TaskId};
use docket_engine::{EngineConfig, TaskEngine};
use docket_reminders::providers::RecordingNotifier;
use docket_tasks::{MemoryPersistence, TaskCreateParams, TaskStatus, TaskUpdateParams};

const TASKS: usize = 64;

struct Shared {
    engine: Arc<TaskEngine>,
    db: Arc<MemoryPersistence>,
    notifier: Arc<RecordingNotifier>,
    ids: Vec<TaskId>,
}

/// An engine holding `TASKS` open tasks that are already past due.
fn past_due_set() -> Shared {
    let db = Arc::new(MemoryPersistence::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(ManualClock::starting_now());
    let engine = TaskEngine::new(
        db.clone(),
        notifier.clone(),
        clock.clone(),
        EngineConfig::default(),
    )
    .unwrap();

    let ids = (0..TASKS)
        .map(|i| {
            engine
                .create_task(&TaskCreateParams {
                    due_date: Some(clock.now() - Duration::minutes(1)),
                    ..TaskCreateParams::titled(format!("chore {i}"))
                })
                .unwrap()
                .id
        })
        .collect();

    Shared {
        engine: Arc::new(engine),
        db,
        notifier,
        ids,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sweep_and_user_edits_do_not_lose_updates() {
    let s = past_due_set();

    let sweeper = {
        let engine = Arc::clone(&s.engine);
        tokio::task::spawn_blocking(move || {
            (0..8)
                .map(|_| engine.run_reconcile_tick().unwrap().transitions.len())
                .sum::<usize>()
        })
    };
    let editor = {
        let engine = Arc::clone(&s.engine);
        let ids = s.ids.clone();
        tokio::task::spawn_blocking(move || {
            for id in &ids {
                engine.toggle_task_completion(id).unwrap();
                let title = format!("{} (done)", engine.get_task(id).unwrap().title);
                engine
                    .update_task(
                        id,
                        &TaskUpdateParams {
                            title: Some(title),
                            ..TaskUpdateParams::default()
                        },
                    )
                    .unwrap();
            }
        })
    };

    let swept = sweeper.await.unwrap();
    editor.await.unwrap();
    s.engine.flush().await;

    // Whatever the interleaving, each toggle lands last: no sweep may
    // reopen a completed task or roll back its title.
    for id in &s.ids {
        let task = s.engine.get_task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed, "{}", task.title);
        assert!(task.title.ends_with("(done)"));
        assert_eq!(s.db.row(id).as_ref(), Some(&task));
    }
    assert!(swept <= TASKS);
    assert_eq!(s.notifier.fired().len(), swept);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_the_whole_batch_or_none_of_it() {
    let s = past_due_set();

    let reader = {
        let engine = Arc::clone(&s.engine);
        tokio::task::spawn_blocking(move || {
            let mut observed = BTreeSet::new();
            loop {
                let snapshot = engine.list_filtered_tasks("", None);
                assert_eq!(snapshot.len(), TASKS);
                let overdue = snapshot
                    .iter()
                    .filter(|t| t.status == TaskStatus::Overdue)
                    .count();
                observed.insert(overdue);
                if overdue == TASKS {
                    return observed;
                }
                std::thread::yield_now();
            }
        })
    };
    let sweeper = {
        let engine = Arc::clone(&s.engine);
        tokio::task::spawn_blocking(move || engine.run_reconcile_tick().unwrap())
    };

    let report = sweeper.await.unwrap();
    let observed = reader.await.unwrap();

    assert_eq!(report.transitions.len(), TASKS);
    assert!(
        observed.iter().all(|&n| n == 0 || n == TASKS),
        "partial batch observed: {observed:?}"
    );
    let visible = s.engine.visible_tasks();
    assert!(visible.iter().all(|t| t.status == TaskStatus::Overdue));
}
