//! `SQLite` persistence.
//!
//! One connection behind a mutex; every [`SaveBatch`] runs in a single
//! transaction. Timestamps are RFC 3339 strings; priority is stored as its
//! ordinal in text form.
//!
//! A file database is opened in exclusive locking mode and the lock is held
//! until the connection closes. The store loads rows once and writes from
//! memory, so a second process on the same file would overwrite its changes;
//! opening a file another connection owns fails with
//! [`PersistenceError::InUse`].

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use docket_core::TaskId;
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};
use tracing::debug;

use super::migrations::run_migrations;
use super::{SaveBatch, TaskPersistence};
use crate::errors::PersistenceError;
use crate::types::{Category, Task, TaskLocation, TaskPriority, TaskStatus};

/// Task persistence backed by a `SQLite` database.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqlitePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePersistence").finish_non_exhaustive()
    }
}

impl SqlitePersistence {
    /// Open (or create) a database file, take ownership of it, and run
    /// migrations.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        // No busy timeout: an owned file is refused at once.
        conn.execute_batch(
            "PRAGMA locking_mode = EXCLUSIVE; PRAGMA journal_mode = WAL; \
             BEGIN EXCLUSIVE; COMMIT;",
        )
        .map_err(|error| in_use_or(error, path))?;
        debug!(?path, "opened task database");
        Self::from_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection and run migrations on it.
    pub fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl TaskPersistence for SqlitePersistence {
    fn load_all(&self) -> Result<Vec<Task>, PersistenceError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, title, description, created_at, due_date, priority, status, category, \
             location_latitude, location_longitude, location_radius, location_name, \
             schedule_time_enabled \
             FROM tasks ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], RawTask::from_row)?;

        let mut tasks = Vec::new();
        for raw in rows {
            tasks.push(raw?.into_task()?);
        }
        debug!(count = tasks.len(), "loaded tasks");
        Ok(tasks)
    }

    fn save_batch(&self, batch: &SaveBatch) -> Result<(), PersistenceError> {
        if batch.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT OR REPLACE INTO tasks (id, title, description, created_at, due_date, \
                 priority, status, category, location_latitude, location_longitude, \
                 location_radius, location_name, schedule_time_enabled) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for task in &batch.upserts {
                let location = task.location.as_ref();
                let _ = upsert.execute(params![
                    task.id.as_str(),
                    task.title,
                    task.description,
                    to_sql_time(task.created_at),
                    task.due_date.map(to_sql_time),
                    task.priority.ordinal().to_string(),
                    task.status.as_sql(),
                    task.category.as_sql(),
                    location.map(|l| l.latitude),
                    location.map(|l| l.longitude),
                    location.map(|l| l.radius),
                    location.map(|l| l.name.as_str()),
                    task.schedule_time_enabled,
                ])?;
            }

            let mut delete = tx.prepare_cached("DELETE FROM tasks WHERE id = ?1")?;
            for id in &batch.deletes {
                let _ = delete.execute(params![id.as_str()])?;
            }
        }
        tx.commit()?;

        debug!(
            upserts = batch.upserts.len(),
            deletes = batch.deletes.len(),
            "saved batch"
        );
        Ok(())
    }
}

fn in_use_or(error: rusqlite::Error, path: &Path) -> PersistenceError {
    match &error {
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            PersistenceError::InUse(path.display().to_string())
        }
        _ => PersistenceError::Database(error),
    }
}

fn to_sql_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Row as stored, before validation.
struct RawTask {
    id: String,
    title: String,
    description: String,
    created_at: String,
    due_date: Option<String>,
    priority: String,
    status: String,
    category: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius: Option<f64>,
    location_name: Option<String>,
    schedule_time_enabled: bool,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            due_date: row.get("due_date")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            category: row.get("category")?,
            latitude: row.get("location_latitude")?,
            longitude: row.get("location_longitude")?,
            radius: row.get("location_radius")?,
            location_name: row.get("location_name")?,
            schedule_time_enabled: row.get("schedule_time_enabled")?,
        })
    }

    fn into_task(self) -> Result<Task, PersistenceError> {
        let id = self.id;
        let parse_time = |field: &str, s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| PersistenceError::corrupt(&id, format!("{field}: {e}")))
        };

        let created_at = parse_time("created_at", &self.created_at)?;
        let due_date = self
            .due_date
            .as_deref()
            .map(|s| parse_time("due_date", s))
            .transpose()?;
        let priority = self
            .priority
            .parse::<u8>()
            .ok()
            .and_then(TaskPriority::from_ordinal)
            .ok_or_else(|| {
                PersistenceError::corrupt(&id, format!("priority '{}'", self.priority))
            })?;
        let status = TaskStatus::from_sql(&self.status)
            .ok_or_else(|| PersistenceError::corrupt(&id, format!("status '{}'", self.status)))?;
        let category = Category::from_sql(&self.category).ok_or_else(|| {
            PersistenceError::corrupt(&id, format!("category '{}'", self.category))
        })?;
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(TaskLocation {
                latitude,
                longitude,
                radius: self.radius.unwrap_or(crate::types::DEFAULT_LOCATION_RADIUS_M),
                name: self.location_name.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Task {
            id: TaskId::from(id),
            title: self.title,
            description: self.description,
            created_at,
            due_date,
            priority,
            status,
            category,
            location,
            schedule_time_enabled: self.schedule_time_enabled,
        })
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    fn sample(id: &str) -> Task {
        Task {
            id: TaskId::from(id),
            title: "Pay rent".into(),
            description: "before the 5th".into(),
            created_at: Utc.with_ymd_and_hms(2025, 5, 1, 8, 30, 0).unwrap()
                + Duration::nanoseconds(123_456_789),
            due_date: Some(Utc.with_ymd_and_hms(2025, 5, 5, 17, 0, 0).unwrap()),
            priority: TaskPriority::Urgent,
            status: TaskStatus::Pending,
            category: Category::Personal,
            location: Some(TaskLocation::new(52.52, 13.405, "Landlord")),
            schedule_time_enabled: true,
        }
    }

    #[test]
    fn upsert_then_load() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        let task = sample("t1");
        db.save_batch(&SaveBatch::upsert(task.clone())).unwrap();

        let loaded = db.load_all().unwrap();
        assert_eq!(loaded, vec![task]);
    }

    #[test]
    fn undated_task_without_location() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        let mut task = sample("t1");
        task.due_date = None;
        task.location = None;
        db.save_batch(&SaveBatch::upsert(task.clone())).unwrap();
        assert_eq!(db.load_all().unwrap(), vec![task]);
    }

    #[test]
    fn upsert_replaces() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        let mut task = sample("t1");
        db.save_batch(&SaveBatch::upsert(task.clone())).unwrap();
        task.status = TaskStatus::Completed;
        db.save_batch(&SaveBatch::upsert(task.clone())).unwrap();

        let loaded = db.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, TaskStatus::Completed);
    }

    #[test]
    fn priority_stored_as_ordinal_text() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        db.save_batch(&SaveBatch::upsert(sample("t1"))).unwrap();

        let stored: String = db
            .conn
            .lock()
            .query_row("SELECT priority FROM tasks WHERE id = 't1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, "4");
    }

    #[test]
    fn batch_with_deletes() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        db.save_batch(&SaveBatch {
            upserts: vec![sample("a"), sample("b")],
            deletes: vec![],
        })
        .unwrap();
        db.save_batch(&SaveBatch {
            upserts: vec![sample("c")],
            deletes: vec![TaskId::from("a")],
        })
        .unwrap();

        let mut ids: Vec<String> = db
            .load_all()
            .unwrap()
            .into_iter()
            .map(|t| t.id.into_inner())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn failed_batch_rolls_back() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        db.save_batch(&SaveBatch::upsert(sample("a"))).unwrap();

        // A trigger rejects the second upsert mid-transaction.
        db.conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_bad BEFORE INSERT ON tasks WHEN NEW.id = 'bad' \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let result = db.save_batch(&SaveBatch {
            upserts: vec![sample("ok"), sample("bad")],
            deletes: vec![TaskId::from("a")],
        });
        assert_matches!(result, Err(PersistenceError::Database(_)));

        let ids: Vec<String> = db
            .load_all()
            .unwrap()
            .into_iter()
            .map(|t| t.id.into_inner())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn corrupt_row_reported() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        db.conn
            .lock()
            .execute(
                "INSERT INTO tasks (id, title, created_at) VALUES ('x', 't', 'yesterday')",
                [],
            )
            .unwrap();
        assert_matches!(
            db.load_all(),
            Err(PersistenceError::Corrupt { id, reason }) if id == "x" && reason.contains("created_at")
        );
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docket.db");
        {
            let db = SqlitePersistence::open(&path).unwrap();
            db.save_batch(&SaveBatch::upsert(sample("t1"))).unwrap();
        }
        let db = SqlitePersistence::open(&path).unwrap();
        assert_eq!(db.load_all().unwrap(), vec![sample("t1")]);
    }

    #[test]
    fn owned_file_is_refused_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docket.db");
        let owner = SqlitePersistence::open(&path).unwrap();
        owner.save_batch(&SaveBatch::upsert(sample("t1"))).unwrap();

        assert_matches!(
            SqlitePersistence::open(&path),
            Err(PersistenceError::InUse(p)) if p == path.display().to_string()
        );

        drop(owner);
        let next = SqlitePersistence::open(&path).unwrap();
        assert_eq!(next.load_all().unwrap(), vec![sample("t1")]);
    }

    #[test]
    fn empty_batch_is_noop() {
        let db = SqlitePersistence::open_in_memory().unwrap();
        db.save_batch(&SaveBatch::default()).unwrap();
        assert!(db.load_all().unwrap().is_empty());
    }
}
