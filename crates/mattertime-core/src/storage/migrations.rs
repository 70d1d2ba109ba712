//! Database schema migrations for mattertime.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{params, Connection, Result as SqliteResult};

use crate::task::DEFAULT_CATEGORIES;

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("failed to read schema_version: {e}");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: tasks, sessions and seeded categories.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS categories (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL DEFAULT '#6366f1'
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id        INTEGER NOT NULL,
            title          TEXT NOT NULL,
            description    TEXT,
            matter         TEXT,
            category_id    INTEGER REFERENCES categories(id),
            status         TEXT NOT NULL DEFAULT 'open',
            total_duration INTEGER NOT NULL DEFAULT 0,
            is_running     INTEGER NOT NULL DEFAULT 0,
            started_at     TEXT,
            created_at     TEXT NOT NULL,
            completed_at   TEXT,
            CHECK (total_duration >= 0),
            CHECK (is_running = 0 OR status = 'open')
        );

        CREATE TABLE IF NOT EXISTS task_sessions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id       INTEGER NOT NULL REFERENCES tasks(id),
            user_id       INTEGER NOT NULL,
            started_at    TEXT NOT NULL,
            ended_at      TEXT NOT NULL,
            duration_secs INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_user_created ON tasks(user_id, created_at);",
    )?;

    for (name, color) in DEFAULT_CATEGORIES {
        tx.execute(
            "INSERT OR IGNORE INTO categories (name, color) VALUES (?1, ?2)",
            params![name, color],
        )?;
    }

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: at most one running task per user, enforced by the schema.
///
/// Any duplicates left behind by an older binary are stopped first, keeping
/// the most recently started one.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "UPDATE tasks SET is_running = 0, started_at = NULL
         WHERE is_running = 1
           AND id NOT IN (
               SELECT id FROM tasks t
               WHERE t.is_running = 1
                 AND t.started_at = (
                     SELECT MAX(started_at) FROM tasks u
                     WHERE u.user_id = t.user_id AND u.is_running = 1
                 )
               GROUP BY t.user_id
           );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_one_running
            ON tasks(user_id) WHERE is_running = 1;

        CREATE INDEX IF NOT EXISTS idx_sessions_task ON task_sessions(task_id, started_at);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let categories: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(categories, DEFAULT_CATEGORIES.len() as i64);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn v2_stops_duplicate_runners_before_indexing() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO tasks (user_id, title, is_running, started_at, created_at)
             VALUES (1, 'a', 1, '2025-01-01T09:00:00+00:00', '2025-01-01T08:00:00+00:00'),
                    (1, 'b', 1, '2025-01-01T10:00:00+00:00', '2025-01-01T08:00:00+00:00'),
                    (2, 'c', 1, '2025-01-01T09:30:00+00:00', '2025-01-01T08:00:00+00:00');",
        )
        .unwrap();

        migrate(&conn).unwrap();

        let running: Vec<String> = conn
            .prepare("SELECT title FROM tasks WHERE is_running = 1 ORDER BY title")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(running, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn unique_index_rejects_second_runner() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO tasks (user_id, title, is_running, started_at, created_at)
             VALUES (1, 'a', 1, '2025-01-01T09:00:00+00:00', '2025-01-01T08:00:00+00:00')",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO tasks (user_id, title, is_running, started_at, created_at)
             VALUES (1, 'b', 1, '2025-01-01T09:00:00+00:00', '2025-01-01T08:00:00+00:00')",
            [],
        );
        assert!(second.is_err());
    }
}
