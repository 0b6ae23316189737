//! SQL DDL for the task table.

use rusqlite::Connection;

use crate::errors::PersistenceError;

/// Create the task table and indexes.
///
/// Idempotent (uses `IF NOT EXISTS`).
pub fn run_migrations(conn: &Connection) -> Result<(), PersistenceError> {
    conn.execute_batch(TASKS_SCHEMA)?;
    Ok(())
}

/// Priority is kept as its string-encoded ordinal (`'1'`..`'4'`).
const TASKS_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    due_date TEXT,
    priority TEXT NOT NULL DEFAULT '2'
        CHECK(priority IN ('1', '2', '3', '4')),
    status TEXT NOT NULL DEFAULT 'in_progress'
        CHECK(status IN ('pending', 'in_progress', 'completed', 'overdue')),
    category TEXT NOT NULL DEFAULT 'work'
        CHECK(category IN ('work', 'shopping', 'personal')),
    location_latitude REAL,
    location_longitude REAL,
    location_radius REAL,
    location_name TEXT,
    schedule_time_enabled INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tasks_status_due
    ON tasks(status, due_date);
CREATE INDEX IF NOT EXISTS idx_tasks_category
    ON tasks(category);
";
