//! # Mattertime Core Library
//!
//! Task timing for a single user at a time: tasks are created, started,
//! stopped and completed, and the library accumulates the seconds spent on
//! each. The CLI binary is a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Timer State Machine**: [`TimerService`] keeps at most one task
//!   running per user, force-stopping the previous one on `start`
//! - **Duration Accumulator**: [`timer::accumulator`] turns start/stop
//!   instants into credited seconds, clamping clock anomalies to zero
//! - **Storage**: the [`TaskStore`] contract, backed by SQLite
//!   ([`SqliteTaskStore`]) or memory ([`MemoryTaskStore`]), plus a
//!   TOML [`Config`]
//!
//! Nothing here runs in the background. A running timer's displayed elapsed
//! time is a projection, see [`Task::elapsed_at`].

pub mod error;
pub mod events;
pub mod storage;
pub mod task;
pub mod timer;

pub use error::{ConfigError, CoreError, StoreError, TimerError, ValidationError};
pub use events::{Event, StopReason};
pub use storage::{Config, MemoryTaskStore, SqliteTaskStore, TaskStore};
pub use task::{Category, NewTask, Session, Task, TaskStatus, TimerState};
pub use timer::{Clock, ManualClock, SystemClock, TimerService, Transition};
