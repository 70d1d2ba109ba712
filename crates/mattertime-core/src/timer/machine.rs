//! Timer state machine.
//!
//! [`TimerService`] owns a [`TaskStore`] and a [`Clock`] and is the only
//! code that flips `is_running`. Each operation reads, decides and writes
//! inside one store transaction, which is what keeps "at most one running
//! task per user" true under concurrent callers.
//!
//! ## Usage
//!
//! ```
//! use mattertime_core::storage::MemoryTaskStore;
//! use mattertime_core::task::NewTask;
//! use mattertime_core::timer::{ManualClock, TimerService};
//!
//! let clock = ManualClock::at_epoch();
//! let mut service = TimerService::with_clock(MemoryTaskStore::new(), clock.clone());
//! let task = service.create_task(1, NewTask::new("Review NDA")).unwrap();
//!
//! service.start(task.id, 1).unwrap();
//! clock.set_secs(125);
//! let stopped = service.stop(task.id, 1).unwrap();
//! assert_eq!(stopped.task.total_duration, 125);
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::accumulator;
use super::clock::{Clock, SystemClock};
use crate::error::{TimerError, ValidationError};
use crate::events::{Event, StopReason};
use crate::storage::TaskStore;
use crate::task::{Category, NewSession, NewTask, Session, Task, TaskStatus, TimerState};

/// Result of a timer operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// The target task after the operation.
    pub task: Task,
    /// Task force-stopped by `start`, if another one was running.
    pub stopped: Option<Task>,
    /// False when the call was a no-op.
    pub changed: bool,
    pub events: Vec<Event>,
}

impl Transition {
    fn unchanged(task: Task) -> Self {
        Self {
            task,
            stopped: None,
            changed: false,
            events: Vec::new(),
        }
    }
}

/// Enforces the single-running-timer invariant and accumulates durations.
pub struct TimerService<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: TaskStore> TimerService<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: TaskStore, C: Clock> TimerService<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Create an open, idle task for `user_id`.
    ///
    /// # Errors
    /// [`TimerError::Validation`] for an empty title or an unknown category.
    pub fn create_task(&mut self, user_id: i64, new: NewTask) -> Result<Task, TimerError> {
        let new = new.normalized()?;
        if let Some(category_id) = new.category_id {
            if !self.store.categories()?.iter().any(|c| c.id == category_id) {
                return Err(ValidationError::UnknownCategory(category_id).into());
            }
        }
        let task = self.store.create(user_id, &new, self.clock.now())?;
        tracing::info!(task_id = task.id, user_id, title = %task.title, "task created");
        Ok(task)
    }

    pub fn get_task(&self, task_id: i64, user_id: i64) -> Result<Task, TimerError> {
        self.store
            .get(task_id, user_id)?
            .ok_or(TimerError::NotFound { task_id })
    }

    pub fn list_tasks(
        &self,
        user_id: i64,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, TimerError> {
        Ok(self.store.list(user_id, status)?)
    }

    /// Finalized intervals of a task, oldest first.
    pub fn sessions(&self, task_id: i64, user_id: i64) -> Result<Vec<Session>, TimerError> {
        self.get_task(task_id, user_id)?;
        Ok(self.store.sessions(task_id, user_id)?)
    }

    pub fn categories(&self) -> Result<Vec<Category>, TimerError> {
        Ok(self.store.categories()?)
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// Start the task's timer, stopping any other running task of the user.
    ///
    /// Starting a task that is already running is a no-op.
    ///
    /// # Errors
    /// [`TimerError::NotFound`] if the task is absent or not owned by
    /// `user_id`; [`TimerError::InvalidState`] if it is completed.
    pub fn start(&mut self, task_id: i64, user_id: i64) -> Result<Transition, TimerError> {
        let clock = &self.clock;
        self.store.transaction(|store| -> Result<Transition, TimerError> {
            // Read the clock only once the store lock is held.
            let now = clock.now();
            let task = load(store, task_id, user_id)?;
            match task.timer_state() {
                TimerState::Completed => Err(TimerError::InvalidState {
                    task_id,
                    state: TimerState::Completed,
                    action: "start",
                }),
                TimerState::Running => {
                    tracing::debug!(task_id, user_id, "start ignored, already running");
                    Ok(Transition::unchanged(task))
                }
                TimerState::Idle => {
                    let mut events = Vec::new();
                    let stopped = match store.find_running(user_id)? {
                        Some(previous) => {
                            let previous =
                                stop_running(store, previous, now, StopReason::Switched, &mut events)?;
                            Some(previous)
                        }
                        None => None,
                    };

                    let mut next = task.clone();
                    next.is_running = true;
                    next.started_at = Some(now);
                    let saved = store.save(&next, task.guard())?;

                    events.push(Event::TimerStarted { task_id, at: now });
                    tracing::info!(
                        task_id,
                        user_id,
                        stopped = stopped.as_ref().map(|t| t.id),
                        "timer started"
                    );
                    Ok(Transition {
                        task: saved,
                        stopped,
                        changed: true,
                        events,
                    })
                }
            }
        })
    }

    /// Stop the task's timer and credit the elapsed interval.
    ///
    /// Stopping an idle or completed task is a no-op so that stale client
    /// retries are harmless.
    ///
    /// # Errors
    /// [`TimerError::NotFound`] if the task is absent or not owned by `user_id`.
    pub fn stop(&mut self, task_id: i64, user_id: i64) -> Result<Transition, TimerError> {
        let clock = &self.clock;
        self.store.transaction(|store| -> Result<Transition, TimerError> {
            let now = clock.now();
            let task = load(store, task_id, user_id)?;
            if task.timer_state() != TimerState::Running {
                tracing::debug!(task_id, user_id, state = %task.timer_state(), "stop ignored, not running");
                return Ok(Transition::unchanged(task));
            }

            let mut events = Vec::new();
            let saved = stop_running(store, task, now, StopReason::Manual, &mut events)?;
            Ok(Transition {
                task: saved,
                stopped: None,
                changed: true,
                events,
            })
        })
    }

    /// Mark the task completed, stopping it first if it is running.
    ///
    /// Completing a completed task is a no-op.
    ///
    /// # Errors
    /// [`TimerError::NotFound`] if the task is absent or not owned by `user_id`.
    pub fn complete(&mut self, task_id: i64, user_id: i64) -> Result<Transition, TimerError> {
        let clock = &self.clock;
        self.store.transaction(|store| -> Result<Transition, TimerError> {
            let now = clock.now();
            let mut task = load(store, task_id, user_id)?;
            let mut events = Vec::new();
            match task.timer_state() {
                TimerState::Completed => {
                    tracing::debug!(task_id, user_id, "complete ignored, already completed");
                    return Ok(Transition::unchanged(task));
                }
                TimerState::Running => {
                    task = stop_running(store, task, now, StopReason::Completed, &mut events)?;
                }
                TimerState::Idle => {}
            }

            let mut next = task.clone();
            next.status = TaskStatus::Completed;
            next.completed_at = Some(now);
            let saved = store.save(&next, task.guard())?;

            events.push(Event::TaskCompleted {
                task_id,
                total_duration: saved.total_duration,
                at: now,
            });
            tracing::info!(task_id, user_id, total_duration = saved.total_duration, "task completed");
            Ok(Transition {
                task: saved,
                stopped: None,
                changed: true,
                events,
            })
        })
    }

    /// The user's running task, if any.
    pub fn active(&self, user_id: i64) -> Result<Option<Task>, TimerError> {
        Ok(self.store.find_running(user_id)?)
    }
}

fn load<S: TaskStore>(store: &S, task_id: i64, user_id: i64) -> Result<Task, TimerError> {
    store
        .get(task_id, user_id)?
        .ok_or(TimerError::NotFound { task_id })
}

/// Finalize the running interval of `task` at `now` and move it to idle.
///
/// A clock that went backwards credits zero seconds instead of failing.
fn stop_running<S: TaskStore>(
    store: &mut S,
    task: Task,
    now: DateTime<Utc>,
    reason: StopReason,
    events: &mut Vec<Event>,
) -> Result<Task, TimerError> {
    let started_at = task.started_at.unwrap_or_else(|| {
        tracing::warn!(task_id = task.id, "running task has no start instant");
        now
    });
    let interval = accumulator::finalize(started_at, now);
    if interval.clamped {
        events.push(Event::IntervalClamped {
            task_id: task.id,
            started_at,
            stopped_at: now,
        });
    }

    let mut next = task.clone();
    next.total_duration =
        accumulator::accumulate(task.total_duration, interval.started_at, interval.ended_at)?;
    next.is_running = false;
    next.started_at = None;
    let saved = store.save(&next, task.guard())?;

    store.record_session(&NewSession {
        task_id: task.id,
        user_id: task.user_id,
        started_at: interval.started_at,
        ended_at: interval.ended_at,
        duration_secs: interval.duration_secs,
    })?;

    events.push(Event::TimerStopped {
        task_id: task.id,
        reason,
        elapsed_secs: interval.duration_secs,
        total_duration: saved.total_duration,
        at: now,
    });
    tracing::info!(
        task_id = task.id,
        user_id = task.user_id,
        ?reason,
        elapsed_secs = interval.duration_secs,
        total_duration = saved.total_duration,
        "timer stopped"
    );
    Ok(saved)
}
