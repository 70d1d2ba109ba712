pub mod category;
pub mod config;
pub mod task;
pub mod timer;

use mattertime_core::{Config, CoreError, SqliteTaskStore, TimerService};
use serde::Serialize;

use crate::GlobalArgs;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Everything a task or timer command needs: the service over the
/// resolved database and the user it acts for.
pub struct Context {
    pub service: TimerService<SqliteTaskStore>,
    pub user_id: i64,
    pub config: Config,
}

impl Context {
    /// `--db` and `--user` take precedence over the config file.
    pub fn open(global: &GlobalArgs, config: Config) -> Result<Self, CoreError> {
        let path = match &global.db {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => config.database_path()?,
        };
        let store = SqliteTaskStore::open_at(&path)?;
        Ok(Self {
            service: TimerService::new(store),
            user_id: global.user.unwrap_or(config.user_id),
            config,
        })
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
