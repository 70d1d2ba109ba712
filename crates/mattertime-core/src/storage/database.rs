//! SQLite-backed task store.
//!
//! Provides persistent storage for:
//! - Tasks and their accumulated timer state
//! - Finalized timing sessions
//! - Seeded task categories

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations, TaskStore};
use crate::error::{CoreError, StoreError};
use crate::task::{Category, Guard, NewSession, NewTask, Session, Task, TaskStatus};

const TASK_COLUMNS: &str = "id, user_id, title, description, matter, category_id, status,
     total_duration, is_running, started_at, created_at, completed_at";

/// How long a writer waits on another process's transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn parse_datetime(idx: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_optional_datetime(
    idx: usize,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.map(|v| parse_datetime(idx, &v)).transpose()
}

fn parse_status(idx: usize, value: &str) -> Result<TaskStatus, rusqlite::Error> {
    TaskStatus::parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown task status: {value}").into(),
        )
    })
}

fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let status: String = row.get(6)?;
    let total_duration: i64 = row.get(7)?;
    let started_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let completed_at: Option<String> = row.get(11)?;

    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        matter: row.get(4)?,
        category_id: row.get(5)?,
        status: parse_status(6, &status)?,
        total_duration: total_duration.max(0) as u64,
        is_running: row.get(8)?,
        started_at: parse_optional_datetime(9, started_at)?,
        created_at: parse_datetime(10, &created_at)?,
        completed_at: parse_optional_datetime(11, completed_at)?,
    })
}

fn row_to_session(row: &rusqlite::Row) -> Result<Session, rusqlite::Error> {
    let started_at: String = row.get(3)?;
    let ended_at: String = row.get(4)?;
    let duration_secs: i64 = row.get(5)?;
    Ok(Session {
        id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        started_at: parse_datetime(3, &started_at)?,
        ended_at: parse_datetime(4, &ended_at)?,
        duration_secs: duration_secs.max(0) as u64,
    })
}

/// SQLite stores seconds as i64; totals beyond that are pinned.
fn secs_to_sql(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// SQLite database holding tasks, sessions and categories.
pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/mattertime.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory, the file, or a migration fails.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("mattertime.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self { conn };
        store.migrate()?;
        tracing::debug!(path = %path.display(), "opened task database");
        Ok(store)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&self.conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))
    }
}

impl TaskStore for SqliteTaskStore {
    fn get(&self, task_id: i64, user_id: i64) -> Result<Option<Task>, StoreError> {
        let task = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"),
                params![task_id, user_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    fn list(&self, user_id: i64, status: Option<TaskStatus>) -> Result<Vec<Task>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![user_id, status.map(|s| s.as_str())], row_to_task)?;
        let tasks = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    fn create(
        &mut self,
        user_id: i64,
        new: &NewTask,
        created_at: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        self.conn.execute(
            "INSERT INTO tasks (user_id, title, description, matter, category_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                new.title,
                new.description,
                new.matter,
                new.category_id,
                TaskStatus::Open.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get(id, user_id)?
            .ok_or(StoreError::Missing { task_id: id })
    }

    fn save(&mut self, task: &Task, expected: Guard) -> Result<Task, StoreError> {
        let changed = self.conn.execute(
            "UPDATE tasks SET
                title = ?1, description = ?2, matter = ?3, category_id = ?4,
                status = ?5, total_duration = ?6, is_running = ?7,
                started_at = ?8, completed_at = ?9
             WHERE id = ?10 AND user_id = ?11
               AND status = ?12 AND is_running = ?13
               AND total_duration <= ?6",
            params![
                task.title,
                task.description,
                task.matter,
                task.category_id,
                task.status.as_str(),
                secs_to_sql(task.total_duration),
                task.is_running,
                task.started_at.map(|dt| dt.to_rfc3339()),
                task.completed_at.map(|dt| dt.to_rfc3339()),
                task.id,
                task.user_id,
                expected.status.as_str(),
                expected.is_running,
            ],
        )?;

        if changed == 0 {
            return match self.get(task.id, task.user_id)? {
                None => Err(StoreError::Missing { task_id: task.id }),
                Some(current) => Err(StoreError::Conflict(format!(
                    "task {} is {} with {}s recorded",
                    current.id,
                    current.timer_state(),
                    current.total_duration
                ))),
            };
        }

        self.get(task.id, task.user_id)?
            .ok_or(StoreError::Missing { task_id: task.id })
    }

    fn find_running(&self, user_id: i64) -> Result<Option<Task>, StoreError> {
        let task = self
            .conn
            .query_row(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE user_id = ?1 AND is_running = 1
                     LIMIT 1"
                ),
                params![user_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    fn record_session(&mut self, session: &NewSession) -> Result<Session, StoreError> {
        self.conn.execute(
            "INSERT INTO task_sessions (task_id, user_id, started_at, ended_at, duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.task_id,
                session.user_id,
                session.started_at.to_rfc3339(),
                session.ended_at.to_rfc3339(),
                secs_to_sql(session.duration_secs),
            ],
        )?;
        Ok(Session {
            id: self.conn.last_insert_rowid(),
            task_id: session.task_id,
            user_id: session.user_id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            duration_secs: session.duration_secs,
        })
    }

    fn sessions(&self, task_id: i64, user_id: i64) -> Result<Vec<Session>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, user_id, started_at, ended_at, duration_secs
             FROM task_sessions
             WHERE task_id = ?1 AND user_id = ?2
             ORDER BY started_at, id",
        )?;
        let rows = stmt.query_map(params![task_id, user_id], row_to_session)?;
        let sessions = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color FROM categories ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
            })
        })?;
        let categories = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        // IMMEDIATE takes the write lock up front, so a second process
        // cannot read the same running task and start its own.
        self.conn
            .execute_batch("BEGIN IMMEDIATE TRANSACTION;")
            .map_err(StoreError::from)?;
        match f(self) {
            Ok(value) => {
                if let Err(err) = self.conn.execute_batch("COMMIT;") {
                    let _ = self.conn.execute_batch("ROLLBACK;");
                    return Err(StoreError::from(err).into());
                }
                Ok(value)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn create_and_get_task() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let created = db
            .create(1, &NewTask::new("Review lease").matter("ACME-7"), now())
            .unwrap();

        let retrieved = db.get(created.id, 1).unwrap().unwrap();
        assert_eq!(retrieved, created);
        assert_eq!(retrieved.status, TaskStatus::Open);
        assert_eq!(retrieved.total_duration, 0);
        assert!(!retrieved.is_running);
        assert_eq!(retrieved.created_at, now());
    }

    #[test]
    fn get_hides_other_users_tasks() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let task = db.create(1, &NewTask::new("Mine"), now()).unwrap();
        assert!(db.get(task.id, 2).unwrap().is_none());
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let older = db.create(1, &NewTask::new("Older"), now()).unwrap();
        let newer = db
            .create(1, &NewTask::new("Newer"), now() + chrono::Duration::minutes(1))
            .unwrap();
        db.create(2, &NewTask::new("Someone else"), now()).unwrap();

        let mut done = older.clone();
        done.status = TaskStatus::Completed;
        done.completed_at = Some(now());
        db.save(&done, older.guard()).unwrap();

        let all = db.list(1, None).unwrap();
        assert_eq!(
            all.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );

        let open = db.list(1, Some(TaskStatus::Open)).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, newer.id);

        let completed = db.list(1, Some(TaskStatus::Completed)).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, older.id);
    }

    #[test]
    fn save_rejects_stale_guard() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let task = db.create(1, &NewTask::new("Draft"), now()).unwrap();

        let mut running = task.clone();
        running.is_running = true;
        running.started_at = Some(now());
        db.save(&running, task.guard()).unwrap();

        // Second writer still believes the task is idle.
        let err = db.save(&running, task.guard()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn save_rejects_decreasing_total() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let task = db.create(1, &NewTask::new("Draft"), now()).unwrap();

        let mut grown = task.clone();
        grown.total_duration = 60;
        let grown = db.save(&grown, task.guard()).unwrap();

        let mut shrunk = grown.clone();
        shrunk.total_duration = 10;
        let err = db.save(&shrunk, grown.guard()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn save_rejects_second_runner() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let a = db.create(1, &NewTask::new("A"), now()).unwrap();
        let b = db.create(1, &NewTask::new("B"), now()).unwrap();

        for task in [&a, &b] {
            let mut running = task.clone();
            running.is_running = true;
            running.started_at = Some(now());
            let result = db.save(&running, task.guard());
            if task.id == a.id {
                result.unwrap();
            } else {
                assert!(matches!(result.unwrap_err(), StoreError::Conflict(_)));
            }
        }
        assert_eq!(db.find_running(1).unwrap().unwrap().id, a.id);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let result: Result<(), StoreError> = db.transaction(|db| {
            db.create(1, &NewTask::new("Ghost"), now())?;
            Err(StoreError::Conflict("abort".into()))
        });
        assert!(result.is_err());
        assert!(db.list(1, None).unwrap().is_empty());
    }

    #[test]
    fn sessions_round_trip() {
        let mut db = SqliteTaskStore::open_memory().unwrap();
        let task = db.create(1, &NewTask::new("Call client"), now()).unwrap();
        let recorded = db
            .record_session(&NewSession {
                task_id: task.id,
                user_id: 1,
                started_at: now(),
                ended_at: now() + chrono::Duration::seconds(90),
                duration_secs: 90,
            })
            .unwrap();

        assert_eq!(db.sessions(task.id, 1).unwrap(), vec![recorded]);
        assert!(db.sessions(task.id, 2).unwrap().is_empty());
    }

    #[test]
    fn categories_are_seeded() {
        let db = SqliteTaskStore::open_memory().unwrap();
        let names: Vec<_> = db
            .categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names[0], "Contract Review");
        assert_eq!(names.len(), 5);
    }
}
