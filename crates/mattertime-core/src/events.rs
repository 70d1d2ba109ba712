use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a running timer was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Explicit `stop` call.
    Manual,
    /// Another task of the same user was started.
    Switched,
    /// The task was completed while running.
    Completed,
}

/// Every state change produced by the timer service yields an Event.
/// Callers print or forward them; the core never persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        task_id: i64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        task_id: i64,
        reason: StopReason,
        /// Seconds credited by this interval.
        elapsed_secs: u64,
        total_duration: u64,
        at: DateTime<Utc>,
    },
    /// The clock ran backwards during an interval; zero seconds were credited.
    IntervalClamped {
        task_id: i64,
        started_at: DateTime<Utc>,
        stopped_at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: i64,
        total_duration: u64,
        at: DateTime<Utc>,
    },
}
