//! Command-line definitions.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use docket_tasks::{Category, TaskPriority, TaskStatus};

/// Personal task manager with reminders.
#[derive(Parser, Debug)]
#[command(name = "docket", about = "Personal task manager with reminders")]
pub struct Cli {
    /// Path to the `SQLite` database (overrides settings).
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Keep tasks in memory only; nothing is written to disk.
    #[arg(long, global = true, conflicts_with = "db_path")]
    pub in_memory: bool,

    /// Log level or filter directive (overrides settings).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the reminder daemon until interrupted.
    Run,
    /// Add a task.
    Add {
        /// Title.
        title: String,
        /// Description.
        #[arg(long, short = 'd', default_value = "")]
        description: String,
        /// Due date: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM`, or RFC 3339.
        /// Giving a time of day turns on reminders for the task.
        #[arg(long, value_parser = parse_due)]
        due: Option<DueInput>,
        /// Priority name or 1-4.
        #[arg(long, short = 'p')]
        priority: Option<TaskPriority>,
        /// Category.
        #[arg(long, short = 'c')]
        category: Option<Category>,
        /// Initial status.
        #[arg(long, short = 's')]
        status: Option<TaskStatus>,
    },
    /// List tasks in display order.
    List {
        /// Case-insensitive text to find in title or description.
        #[arg(long, default_value = "")]
        search: String,
        /// Only this category.
        #[arg(long, short = 'c')]
        category: Option<Category>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Edit a task.
    Edit {
        /// Task ID.
        id: String,
        /// New title.
        #[arg(long)]
        title: Option<String>,
        /// New description.
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// New due date (same formats as `add`).
        #[arg(long, value_parser = parse_due, conflicts_with = "clear_due")]
        due: Option<DueInput>,
        /// Remove the due date.
        #[arg(long)]
        clear_due: bool,
        /// New priority.
        #[arg(long, short = 'p')]
        priority: Option<TaskPriority>,
        /// New category.
        #[arg(long, short = 'c')]
        category: Option<Category>,
    },
    /// Set a task's status.
    Status {
        /// Task ID.
        id: String,
        /// New status.
        status: TaskStatus,
    },
    /// Toggle completion.
    Toggle {
        /// Task ID.
        id: String,
    },
    /// Delete a task.
    Delete {
        /// Task ID.
        id: String,
    },
    /// Run one overdue sweep and exit.
    Reconcile,
    /// Send a test notification two minutes from now and wait for it.
    NotifyTest,
}

/// A parsed `--due` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueInput {
    /// The instant.
    pub at: DateTime<Utc>,
    /// Whether a time of day was given.
    pub has_time: bool,
}

/// Parse a due date. Local times are interpreted in the local zone; a bare
/// date means the end of that day.
pub fn parse_due(input: &str) -> Result<DueInput, String> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(DueInput {
            at: at.with_timezone(&Utc),
            has_time: true,
        });
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(DueInput {
                at: local_to_utc(naive)?,
                has_time: true,
            });
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        return Ok(DueInput {
            at: local_to_utc(date.and_time(end_of_day))?,
            has_time: false,
        });
    }
    Err(format!(
        "invalid due date '{input}', expected YYYY-MM-DD, YYYY-MM-DD HH:MM, or RFC 3339"
    ))
}

fn local_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>, String> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("{naive} does not exist in the local time zone"))
}
