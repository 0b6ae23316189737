//! # docket
//!
//! Command-line front end for the Docket task engine. `docket run` keeps the
//! reconciler and reminder timers alive until interrupted; every other
//! subcommand performs one command against the database and exits.
//!
//! Each process owns the database file while it is open, so one-shot
//! commands are refused while `docket run` is up.

#![deny(unsafe_code)]

mod cli;
mod render;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use docket_core::{SystemClock, TaskId};
use docket_engine::{EngineConfig, TaskEngine};
use docket_reminders::providers::{DeliveredNotification, LocalNotifier};
use docket_settings::DocketSettings;
use docket_tasks::{
    MemoryPersistence, SqlitePersistence, TaskCreateParams, TaskPersistence, TaskUpdateParams,
};
use tokio::sync::mpsc;

use crate::cli::{Cli, Command};

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_persistence(args: &Cli, settings: &DocketSettings) -> Result<Arc<dyn TaskPersistence>> {
    if args.in_memory {
        return Ok(Arc::new(MemoryPersistence::new()));
    }
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| settings.storage.resolved_db_path());
    ensure_parent_dir(&db_path)?;
    let db = SqlitePersistence::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");
    Ok(Arc::new(db))
}

fn print_delivered(notification: &DeliveredNotification) {
    println!(
        "[{}] {}: {}",
        notification.delivered_at.with_timezone(&chrono::Local).format("%H:%M"),
        notification.content.title,
        notification.content.body
    );
}

/// Wait for queued notifier calls, then take everything delivered so far.
///
/// One-shot commands call this before exiting; an overdue alert raised by
/// the command would otherwise be sent into a closed channel and lost.
async fn drain_deliveries(
    engine: &TaskEngine,
    delivered: &mut mpsc::UnboundedReceiver<DeliveredNotification>,
) -> Vec<DeliveredNotification> {
    engine.flush().await;
    let mut drained = Vec::new();
    while let Ok(notification) = delivered.try_recv() {
        drained.push(notification);
    }
    drained
}

async fn forward_deliveries(mut delivered: mpsc::UnboundedReceiver<DeliveredNotification>) {
    while let Some(notification) = delivered.recv().await {
        print_delivered(&notification);
    }
}

async fn run_daemon(
    engine: &TaskEngine,
    delivered: mpsc::UnboundedReceiver<DeliveredNotification>,
) -> Result<()> {
    if !engine.initialize().await {
        tracing::warn!("reminders are off (disabled in settings or notifications unavailable)");
    }
    let printer = tokio::spawn(forward_deliveries(delivered));
    let _ = engine.start_reconciler();
    tracing::info!(
        tasks = engine.list_filtered_tasks("", None).len(),
        interval_secs = engine.config().reconcile_interval.as_secs(),
        "docket running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    engine.shutdown().await;
    printer.abort();
    Ok(())
}

async fn notify_test(
    engine: &TaskEngine,
    mut delivered: mpsc::UnboundedReceiver<DeliveredNotification>,
) -> Result<()> {
    let fire_at = engine.schedule_test_notification();
    println!(
        "Test notification scheduled for {}. Waiting (ctrl-c to abort)...",
        fire_at.with_timezone(&chrono::Local).format("%H:%M:%S")
    );
    tokio::select! {
        notification = delivered.recv() => {
            let notification = notification.context("Notification channel closed")?;
            print_delivered(&notification);
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            println!("Aborted.");
        }
    }
    Ok(())
}

async fn execute(
    command: Command,
    engine: &TaskEngine,
    mut delivered: mpsc::UnboundedReceiver<DeliveredNotification>,
) -> Result<()> {
    let color = std::io::stdout().is_terminal();
    match command {
        Command::Run => return run_daemon(engine, delivered).await,
        Command::NotifyTest => return notify_test(engine, delivered).await,
        Command::Add {
            title,
            description,
            due,
            priority,
            category,
            status,
        } => {
            let task = engine.create_task(&TaskCreateParams {
                title,
                description,
                due_date: due.map(|d| d.at),
                priority,
                status,
                category,
                location: None,
                schedule_time_enabled: due.is_some_and(|d| d.has_time),
            })?;
            println!("{}", render::task_line(&task, color));
        }
        Command::List {
            search,
            category,
            json,
        } => {
            let tasks = engine.list_filtered_tasks(&search, category);
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                println!("{}", render::task_table(&tasks, color));
            }
        }
        Command::Edit {
            id,
            title,
            description,
            due,
            clear_due,
            priority,
            category,
        } => {
            let (due_date, schedule_time_enabled) = match (due, clear_due) {
                (Some(d), _) => (Some(Some(d.at)), Some(d.has_time)),
                (None, true) => (Some(None), Some(false)),
                (None, false) => (None, None),
            };
            let params = TaskUpdateParams {
                title,
                description,
                due_date,
                priority,
                category,
                schedule_time_enabled,
                ..TaskUpdateParams::default()
            };
            let task = engine.update_task(&TaskId::from(id), &params)?;
            println!("{}", render::task_line(&task, color));
        }
        Command::Status { id, status } => {
            let task = engine.set_task_status(&TaskId::from(id), status)?;
            println!("{}", render::task_line(&task, color));
        }
        Command::Toggle { id } => {
            let task = engine.toggle_task_completion(&TaskId::from(id))?;
            println!("{}", render::task_line(&task, color));
        }
        Command::Delete { id } => {
            engine.delete_task(&TaskId::from(id.as_str()))?;
            println!("Deleted {id}.");
        }
        Command::Reconcile => {
            let report = engine.run_reconcile_tick()?;
            println!("{}", render::reconcile_summary(&report));
        }
    }
    for notification in drain_deliveries(engine, &mut delivered).await {
        print_delivered(&notification);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings come first: they carry the default log level.
    let settings_path = docket_settings::loader::settings_path();
    let (settings, settings_error) =
        match docket_settings::loader::load_settings_from_path(&settings_path) {
            Ok(settings) => (settings, None),
            Err(error) => (DocketSettings::default(), Some(error)),
        };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.clone());
    if settings.logging.json {
        docket_core::logging::init_json_subscriber(&level);
    } else {
        docket_core::logging::init_subscriber(&level);
    }
    if let Some(error) = settings_error {
        tracing::warn!(path = %settings_path.display(), %error, "Failed to load settings, using defaults");
    }

    let persistence = open_persistence(&args, &settings)?;
    let clock = Arc::new(SystemClock);
    let (notifier, delivered) = LocalNotifier::new(clock.clone());
    let engine = TaskEngine::new(
        persistence,
        Arc::new(notifier),
        clock,
        EngineConfig::from(&settings),
    )
    .context("Failed to load tasks")?;

    let result = execute(args.command, &engine, delivered).await;
    engine.shutdown().await;
    result
}
