mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{Config, DisplayConfig};
pub use database::SqliteTaskStore;
pub use memory::MemoryTaskStore;

use std::path::PathBuf;

use crate::error::{ConfigError, StoreError};
use crate::task::{Category, Guard, NewSession, NewTask, Session, Task, TaskStatus};

/// Persistence contract the timer service depends on.
///
/// Reads take `&self`; writes take `&mut self`. Every timer transition runs
/// inside [`TaskStore::transaction`], so an implementation must make the
/// closure's writes all-or-nothing and isolated from other writers.
pub trait TaskStore {
    /// Task `task_id` if it exists and belongs to `user_id`.
    fn get(&self, task_id: i64, user_id: i64) -> Result<Option<Task>, StoreError>;

    /// The user's tasks, newest first, optionally filtered by status.
    fn list(&self, user_id: i64, status: Option<TaskStatus>) -> Result<Vec<Task>, StoreError>;

    /// Insert an open, idle task with zero duration.
    fn create(
        &mut self,
        user_id: i64,
        new: &NewTask,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Task, StoreError>;

    /// Overwrite `task` if the stored row still matches `expected`.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the row changed underneath the caller,
    /// the write would lower `total_duration`, or it would leave two
    /// running tasks for one user.
    fn save(&mut self, task: &Task, expected: Guard) -> Result<Task, StoreError>;

    /// The user's running task, if any.
    fn find_running(&self, user_id: i64) -> Result<Option<Task>, StoreError>;

    fn record_session(&mut self, session: &NewSession) -> Result<Session, StoreError>;

    /// Finalized intervals of a task, oldest first.
    fn sessions(&self, task_id: i64, user_id: i64) -> Result<Vec<Session>, StoreError>;

    fn categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Run `f` atomically: either every write it made is kept, or none.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>;
}

/// Returns the data directory, creating it if needed.
///
/// `MATTERTIME_DATA_DIR` wins when set. Otherwise `~/.config/mattertime/`,
/// or `~/.config/mattertime-dev/` when `MATTERTIME_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("MATTERTIME_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("MATTERTIME_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("mattertime-dev")
            } else {
                base_dir.join("mattertime")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
