//! Core types for the task model.
//!
//! All serializable types use `camelCase` field names; enums serialize as
//! `snake_case` strings. Enums carry no presentation text, see
//! [`crate::display`] for labels and colors.

use chrono::{DateTime, Utc};
use docket_core::TaskId;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TaskError};

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Being worked on. The status a new task starts in.
    #[default]
    InProgress,
    /// Done. Never changed automatically.
    Completed,
    /// Past its due date without being completed.
    Overdue,
}

impl TaskStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Overdue,
    ];

    /// Whether the task is still open (pending or in progress).
    ///
    /// Only open tasks can become overdue automatically or carry a reminder.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// SQL string representation (matches the `SQLite` CHECK constraint).
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }

    /// Parse the SQL representation.
    #[must_use]
    pub fn from_sql(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_sql() == s)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::from_sql(&normalized)
            .ok_or_else(|| TaskError::Validation(format!("unknown status '{s}'")))
    }
}

/// Task priority, ordered `Low < Medium < High < Urgent`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Ordinal 1.
    Low = 1,
    /// Ordinal 2. Default.
    #[default]
    Medium = 2,
    /// Ordinal 3.
    High = 3,
    /// Ordinal 4.
    Urgent = 4,
}

impl TaskPriority {
    /// All priorities, lowest first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    /// Numeric ordinal (1..=4).
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Priority for an ordinal, if in range.
    #[must_use]
    pub fn from_ordinal(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.ordinal() == n)
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        if let Ok(n) = lower.parse::<u8>() {
            return Self::from_ordinal(n)
                .ok_or_else(|| TaskError::Validation(format!("priority out of range: {n}")));
        }
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| TaskError::Validation(format!("unknown priority '{s}'")))
    }
}

/// Task category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Default.
    #[default]
    Work,
    /// Errands.
    Shopping,
    /// Everything else.
    Personal,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Self; 3] = [Self::Work, Self::Shopping, Self::Personal];

    /// SQL string representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Shopping => "shopping",
            Self::Personal => "personal",
        }
    }

    /// Parse the SQL representation.
    #[must_use]
    pub fn from_sql(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_sql() == s)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl std::str::FromStr for Category {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_sql(&s.trim().to_lowercase())
            .ok_or_else(|| TaskError::Validation(format!("unknown category '{s}'")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// Default geofence radius in meters. Stored, never acted on.
pub const DEFAULT_LOCATION_RADIUS_M: f64 = 100.0;

/// A named place attached to a task. Purely descriptive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLocation {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Radius in meters.
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Human-readable place name.
    #[serde(default)]
    pub name: String,
}

fn default_radius() -> f64 {
    DEFAULT_LOCATION_RADIUS_M
}

impl TaskLocation {
    /// Location with the default radius.
    pub fn new(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            radius: DEFAULT_LOCATION_RADIUS_M,
            name: name.into(),
        }
    }
}

/// A single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique, immutable ID.
    pub id: TaskId,
    /// Non-empty title.
    pub title: String,
    /// Free-form description, may be empty.
    pub description: String,
    /// Creation time, immutable.
    pub created_at: DateTime<Utc>,
    /// Deadline. `None` means the task never becomes overdue.
    pub due_date: Option<DateTime<Utc>>,
    /// Priority.
    pub priority: TaskPriority,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Category.
    pub category: Category,
    /// Optional place.
    pub location: Option<TaskLocation>,
    /// Whether the due date carries a time of day. Also gates reminders.
    pub schedule_time_enabled: bool,
}

impl Task {
    /// Whether the task is due strictly before `now`.
    #[must_use]
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date.is_some_and(|due| due < now)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Params
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for creating a task. Unset fields take the model defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskCreateParams {
    /// Title (required, non-empty after trimming).
    pub title: String,
    /// Description.
    pub description: String,
    /// Due date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Priority (default medium).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// Initial status (default in progress).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Category (default work).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<TaskLocation>,
    /// Time-of-day scheduling and reminders.
    pub schedule_time_enabled: bool,
}

impl TaskCreateParams {
    /// Params with only a title set.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves a field unchanged.
///
/// `due_date` and `location` are tri-state: `None` leaves the field,
/// `Some(None)` clears it, `Some(Some(v))` sets it. On the wire an explicit
/// `null` clears.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskUpdateParams {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set or clear the due date.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option::deserialize"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// New priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// New status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// New category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Set or clear the location.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option::deserialize"
    )]
    pub location: Option<Option<TaskLocation>>,
    /// Toggle time-of-day scheduling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_time_enabled: Option<bool>,
}

impl TaskUpdateParams {
    /// Update that only changes the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether no field would change.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply to `task` after validating. On error `task` is unchanged.
    pub fn apply_to(&self, task: &mut Task) -> Result<()> {
        let title = match &self.title {
            Some(t) => Some(validate_title(t)?),
            None => None,
        };

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(location) = &self.location {
            task.location.clone_from(location);
        }
        if let Some(enabled) = self.schedule_time_enabled {
            task.schedule_time_enabled = enabled;
        }
        Ok(())
    }
}

/// Trim a title and reject it if nothing is left.
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskError::Validation("title must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn sample() -> Task {
        Task {
            id: TaskId::from("t1"),
            title: "Buy milk".into(),
            description: String::new(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap(),
            due_date: None,
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            category: Category::default(),
            location: None,
            schedule_time_enabled: false,
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(TaskStatus::default(), TaskStatus::InProgress);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
        assert_eq!(Category::default(), Category::Work);
        assert!((TaskLocation::new(1.0, 2.0, "Home").radius - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn status_sql_round_trip() {
        for s in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_sql(s.as_sql()), Some(s));
        }
        assert_eq!(TaskStatus::from_sql("cancelled"), None);
    }

    #[test]
    fn status_parse_is_lenient() {
        assert_eq!("In Progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("OVERDUE".parse::<TaskStatus>().unwrap(), TaskStatus::Overdue);
        assert_matches!("done".parse::<TaskStatus>(), Err(TaskError::Validation(_)));
    }

    #[test]
    fn open_statuses() {
        assert!(TaskStatus::Pending.is_open());
        assert!(TaskStatus::InProgress.is_open());
        assert!(!TaskStatus::Completed.is_open());
        assert!(!TaskStatus::Overdue.is_open());
    }

    #[test]
    fn priority_ordinals() {
        assert_eq!(TaskPriority::Low.ordinal(), 1);
        assert_eq!(TaskPriority::Urgent.ordinal(), 4);
        assert_eq!(TaskPriority::from_ordinal(3), Some(TaskPriority::High));
        assert_eq!(TaskPriority::from_ordinal(0), None);
        assert_eq!(TaskPriority::from_ordinal(5), None);
        assert!(TaskPriority::Low < TaskPriority::Urgent);
    }

    #[test]
    fn priority_parse_name_or_ordinal() {
        assert_eq!("urgent".parse::<TaskPriority>().unwrap(), TaskPriority::Urgent);
        assert_eq!("2".parse::<TaskPriority>().unwrap(), TaskPriority::Medium);
        assert_matches!("7".parse::<TaskPriority>(), Err(TaskError::Validation(_)));
        assert_matches!("critical".parse::<TaskPriority>(), Err(TaskError::Validation(_)));
    }

    #[test]
    fn category_parse() {
        assert_eq!("Shopping".parse::<Category>().unwrap(), Category::Shopping);
        assert_matches!("hobby".parse::<Category>(), Err(TaskError::Validation(_)));
    }

    #[test]
    fn task_wire_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["category"], "work");
        assert_eq!(json["scheduleTimeEnabled"], false);
        assert!(json["createdAt"].is_string());
        assert!(json["dueDate"].is_null());
    }

    #[test]
    fn past_due_is_strict() {
        let mut task = sample();
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        assert!(!task.is_past_due(now));
        task.due_date = Some(now);
        assert!(!task.is_past_due(now));
        task.due_date = Some(now - chrono::Duration::seconds(1));
        assert!(task.is_past_due(now));
    }

    #[test]
    fn validate_title_trims() {
        assert_eq!(validate_title("  Pay rent ").unwrap(), "Pay rent");
        assert_matches!(validate_title("   "), Err(TaskError::Validation(_)));
        assert_matches!(validate_title(""), Err(TaskError::Validation(_)));
    }

    #[test]
    fn apply_partial_update() {
        let mut task = sample();
        let due = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        let params = TaskUpdateParams {
            description: Some("2%".into()),
            due_date: Some(Some(due)),
            priority: Some(TaskPriority::High),
            ..TaskUpdateParams::default()
        };
        params.apply_to(&mut task).unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.description, "2%");
        assert_eq!(task.due_date, Some(due));
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[test]
    fn apply_clears_tri_state_fields() {
        let mut task = sample();
        task.due_date = Some(Utc::now());
        task.location = Some(TaskLocation::new(1.0, 2.0, "Shop"));
        let params = TaskUpdateParams {
            due_date: Some(None),
            location: Some(None),
            ..TaskUpdateParams::default()
        };
        params.apply_to(&mut task).unwrap();
        assert!(task.due_date.is_none());
        assert!(task.location.is_none());
    }

    #[test]
    fn apply_rejects_blank_title_without_partial_write() {
        let mut task = sample();
        let before = task.clone();
        let params = TaskUpdateParams {
            title: Some("  ".into()),
            priority: Some(TaskPriority::Urgent),
            ..TaskUpdateParams::default()
        };
        assert_matches!(params.apply_to(&mut task), Err(TaskError::Validation(_)));
        assert_eq!(task, before);
    }

    #[test]
    fn update_params_null_vs_absent() {
        let absent: TaskUpdateParams = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(absent.due_date, None);

        let cleared: TaskUpdateParams = serde_json::from_str(r#"{"dueDate": null}"#).unwrap();
        assert_eq!(cleared.due_date, Some(None));

        let set: TaskUpdateParams =
            serde_json::from_str(r#"{"dueDate": "2025-03-01T10:00:00Z"}"#).unwrap();
        assert!(matches!(set.due_date, Some(Some(_))));
    }

    #[test]
    fn update_params_is_empty() {
        assert!(TaskUpdateParams::default().is_empty());
        assert!(!TaskUpdateParams::status(TaskStatus::Completed).is_empty());
    }

    #[test]
    fn create_params_from_partial_json() {
        let params: TaskCreateParams =
            serde_json::from_str(r#"{"title": "Pay rent", "category": "personal"}"#).unwrap();
        assert_eq!(params.title, "Pay rent");
        assert_eq!(params.category, Some(Category::Personal));
        assert!(params.priority.is_none());
        assert!(!params.schedule_time_enabled);
    }
}
