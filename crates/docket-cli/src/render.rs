//! Terminal rendering of tasks and reports.

use std::fmt::Write as _;

use docket_engine::ReconcileReport;
use docket_tasks::display::{self, Presentation};
use docket_tasks::Task;

const RESET: &str = "\x1b[0m";

fn paint(p: Presentation, width: usize, color: bool) -> String {
    if color {
        format!("{}{:<width$}{RESET}", p.color.ansi(), p.label)
    } else {
        format!("{:<width$}", p.label)
    }
}

/// One table row for `task`.
pub fn task_line(task: &Task, color: bool) -> String {
    let mut line = format!(
        "{}  {}  {}  {}  {}",
        task.id,
        paint(display::status(task.status), 11, color),
        paint(display::priority(task.priority), 6, color),
        paint(display::category(task.category), 8, color),
        task.title,
    );
    if let Some(due) = display::format_due_date(task) {
        let _ = write!(line, "  (due {due})");
    }
    line
}

/// Table of tasks, or a placeholder when there are none.
pub fn task_table(tasks: &[Task], color: bool) -> String {
    if tasks.is_empty() {
        return "No tasks.".to_string();
    }
    tasks
        .iter()
        .map(|task| task_line(task, color))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary of a reconcile tick.
pub fn reconcile_summary(report: &ReconcileReport) -> String {
    match report.transitions.len() {
        0 => "No tasks became overdue.".to_string(),
        1 => "1 task became overdue.".to_string(),
        n => format!("{n} tasks became overdue."),
    }
}
