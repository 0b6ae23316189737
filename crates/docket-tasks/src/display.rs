//! Labels and indicator colors for presenting tasks.
//!
//! Kept apart from the domain enums so the model stays free of UI strings.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

use crate::types::{Category, Task, TaskPriority, TaskStatus};

/// Indicator color names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorColor {
    /// Blue.
    Blue,
    /// Orange.
    Orange,
    /// Green.
    Green,
    /// Red.
    Red,
    /// Yellow.
    Yellow,
    /// Purple.
    Purple,
}

impl IndicatorColor {
    /// Lowercase color name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Orange => "orange",
            Self::Green => "green",
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Purple => "purple",
        }
    }

    /// ANSI foreground escape for terminal output.
    #[must_use]
    pub fn ansi(self) -> &'static str {
        match self {
            Self::Blue => "\x1b[34m",
            Self::Orange => "\x1b[38;5;208m",
            Self::Green => "\x1b[32m",
            Self::Red => "\x1b[31m",
            Self::Yellow => "\x1b[33m",
            Self::Purple => "\x1b[35m",
        }
    }
}

/// Label plus color for one enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Presentation {
    /// Human-readable label.
    pub label: &'static str,
    /// Indicator color.
    pub color: IndicatorColor,
}

const fn p(label: &'static str, color: IndicatorColor) -> Presentation {
    Presentation { label, color }
}

/// Presentation for a status.
pub fn status(status: TaskStatus) -> Presentation {
    match status {
        TaskStatus::Pending => p("Pending", IndicatorColor::Blue),
        TaskStatus::InProgress => p("In Progress", IndicatorColor::Orange),
        TaskStatus::Completed => p("Completed", IndicatorColor::Green),
        TaskStatus::Overdue => p("Overdue", IndicatorColor::Red),
    }
}

/// Presentation for a priority.
pub fn priority(priority: TaskPriority) -> Presentation {
    match priority {
        TaskPriority::Low => p("Low", IndicatorColor::Green),
        TaskPriority::Medium => p("Medium", IndicatorColor::Yellow),
        TaskPriority::High => p("High", IndicatorColor::Orange),
        TaskPriority::Urgent => p("Urgent", IndicatorColor::Red),
    }
}

/// Presentation for a category.
pub fn category(category: Category) -> Presentation {
    match category {
        Category::Work => p("Work", IndicatorColor::Blue),
        Category::Shopping => p("Shopping", IndicatorColor::Green),
        Category::Personal => p("Personal", IndicatorColor::Purple),
    }
}

/// Due date in the local time zone, or `None` for undated tasks.
pub fn format_due_date(task: &Task) -> Option<String> {
    format_due_date_in(task, &Local)
}

/// Due date rendered in `tz`. Date only unless the task schedules a time.
pub fn format_due_date_in<Tz>(task: &Task, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    task.due_date
        .map(|due| format_instant(due, tz, task.schedule_time_enabled))
}

fn format_instant<Tz>(due: DateTime<Utc>, tz: &Tz, with_time: bool) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let local = due.with_timezone(tz);
    if with_time {
        local.format("%b %-d, %Y at %H:%M").to_string()
    } else {
        local.format("%b %-d, %Y").to_string()
    }
}
