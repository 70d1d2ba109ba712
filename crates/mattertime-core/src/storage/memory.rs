//! In-process task store.
//!
//! Same contract as [`SqliteTaskStore`](super::SqliteTaskStore), including
//! the compare-and-swap checks and the one-runner-per-user constraint.
//! Transactions snapshot the whole state and restore it on error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::TaskStore;
use crate::error::StoreError;
use crate::task::{
    Category, Guard, NewSession, NewTask, Session, Task, TaskStatus, DEFAULT_CATEGORIES,
};

#[derive(Debug, Clone)]
struct State {
    tasks: BTreeMap<i64, Task>,
    sessions: Vec<Session>,
    categories: Vec<Category>,
    next_task_id: i64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            sessions: Vec::new(),
            categories: DEFAULT_CATEGORIES
                .iter()
                .zip(1..)
                .map(|((name, color), id)| Category {
                    id,
                    name: name.to_string(),
                    color: color.to_string(),
                })
                .collect(),
            next_task_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTaskStore {
    state: State,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for MemoryTaskStore {
    fn get(&self, task_id: i64, user_id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self
            .state
            .tasks
            .get(&task_id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    fn list(&self, user_id: i64, status: Option<TaskStatus>) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    fn create(
        &mut self,
        user_id: i64,
        new: &NewTask,
        created_at: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        if let Some(category_id) = new.category_id {
            if !self.state.categories.iter().any(|c| c.id == category_id) {
                return Err(StoreError::Conflict(format!(
                    "category {category_id} does not exist"
                )));
            }
        }

        let id = self.state.next_task_id;
        self.state.next_task_id += 1;
        let task = Task {
            id,
            user_id,
            title: new.title.clone(),
            description: new.description.clone(),
            matter: new.matter.clone(),
            category_id: new.category_id,
            status: TaskStatus::Open,
            total_duration: 0,
            is_running: false,
            started_at: None,
            created_at,
            completed_at: None,
        };
        self.state.tasks.insert(id, task.clone());
        Ok(task)
    }

    fn save(&mut self, task: &Task, expected: Guard) -> Result<Task, StoreError> {
        let current = self
            .state
            .tasks
            .get(&task.id)
            .filter(|t| t.user_id == task.user_id)
            .ok_or(StoreError::Missing { task_id: task.id })?;

        if current.guard() != expected || task.total_duration < current.total_duration {
            return Err(StoreError::Conflict(format!(
                "task {} is {} with {}s recorded",
                current.id,
                current.timer_state(),
                current.total_duration
            )));
        }
        if task.is_running && task.status == TaskStatus::Completed {
            return Err(StoreError::Conflict(format!(
                "task {} cannot run once completed",
                task.id
            )));
        }
        if task.is_running {
            let other = self
                .state
                .tasks
                .values()
                .find(|t| t.user_id == task.user_id && t.is_running && t.id != task.id);
            if let Some(other) = other {
                return Err(StoreError::Conflict(format!(
                    "task {} is already running for user {}",
                    other.id, task.user_id
                )));
            }
        }

        self.state.tasks.insert(task.id, task.clone());
        Ok(task.clone())
    }

    fn find_running(&self, user_id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self
            .state
            .tasks
            .values()
            .find(|t| t.user_id == user_id && t.is_running)
            .cloned())
    }

    fn record_session(&mut self, session: &NewSession) -> Result<Session, StoreError> {
        if !self.state.tasks.contains_key(&session.task_id) {
            return Err(StoreError::Missing {
                task_id: session.task_id,
            });
        }
        let recorded = Session {
            id: self.state.sessions.len() as i64 + 1,
            task_id: session.task_id,
            user_id: session.user_id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            duration_secs: session.duration_secs,
        };
        self.state.sessions.push(recorded.clone());
        Ok(recorded)
    }

    fn sessions(&self, task_id: i64, user_id: i64) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self
            .state
            .sessions
            .iter()
            .filter(|s| s.task_id == task_id && s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    fn categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.state.categories.clone())
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let snapshot = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }
}
