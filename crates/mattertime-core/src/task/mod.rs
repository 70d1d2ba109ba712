//! Task types for the timer core.
//!
//! A [`Task`] carries both its lifecycle `status` and the timer fields
//! (`is_running`, `started_at`, `total_duration`). The timer state is never
//! stored on its own; it is derived from those fields by
//! [`Task::timer_state`].
//!
//! ```text
//!          start               stop
//!   Idle ─────────> Running ─────────> Idle
//!     │                │
//!     │ complete       │ complete (implicit stop)
//!     v                v
//!   Completed <────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Some(TaskStatus::Open),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timer state of a single task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    /// Terminal.
    Completed,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerState::Idle => f.write_str("idle"),
            TimerState::Running => f.write_str("running"),
            TimerState::Completed => f.write_str("completed"),
        }
    }
}

/// A unit of trackable work owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Free-text matter label.
    pub matter: Option<String>,
    pub category_id: Option<i64>,
    pub status: TaskStatus,
    /// Accumulated seconds over all finalized intervals.
    pub total_duration: u64,
    pub is_running: bool,
    /// Start of the current running interval. Set iff `is_running`.
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn timer_state(&self) -> TimerState {
        match (self.status, self.is_running) {
            (TaskStatus::Completed, _) => TimerState::Completed,
            (TaskStatus::Open, true) => TimerState::Running,
            (TaskStatus::Open, false) => TimerState::Idle,
        }
    }

    /// The compare-and-swap guard matching this task's current state.
    pub fn guard(&self) -> Guard {
        Guard {
            status: self.status,
            is_running: self.is_running,
        }
    }

    /// Elapsed seconds as a client would display them at `now`.
    ///
    /// Pure projection: the stored total plus the open interval, if any.
    /// A `now` earlier than `started_at` contributes nothing.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        match (self.is_running, self.started_at) {
            (true, Some(started)) => {
                let open = (now - started).num_seconds().max(0) as u64;
                self.total_duration.saturating_add(open)
            }
            _ => self.total_duration,
        }
    }
}

/// Expected `(status, is_running)` of a row being overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    pub status: TaskStatus,
    pub is_running: bool,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub matter: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn matter(mut self, matter: impl Into<String>) -> Self {
        self.matter = Some(matter.into());
        self
    }

    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Trim text fields, drop blank optionals, and reject an empty title.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(Self {
            title,
            description: non_blank(self.description),
            matter: non_blank(self.matter),
            category_id: self.category_id,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// One finalized running interval of a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Session data before it has been assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub task_id: i64,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Classification shared by all users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// Categories present in a fresh store, in id order.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Contract Review", "#6366f1"),
    ("Legal Research", "#8b5cf6"),
    ("Compliance", "#ec4899"),
    ("Litigation", "#ef4444"),
    ("Corporate", "#f59e0b"),
];
