use clap::Subcommand;
use mattertime_core::{Config, Task};
use serde::Serialize;

use super::{print_json, CliResult, Context};
use crate::GlobalArgs;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a task's timer, stopping whichever task is running
    Start {
        /// Task ID
        id: i64,
    },
    /// Stop a task's timer and add the elapsed time to its total
    Stop {
        /// Task ID
        id: i64,
    },
    /// Mark a task completed, stopping its timer first
    Complete {
        /// Task ID
        id: i64,
    },
    /// Print the running task, if any, with its live elapsed time
    Active,
}

/// Output of `timer active`.
#[derive(Serialize)]
struct ActiveTimer {
    task: Option<Task>,
    /// Stored total plus the open interval.
    elapsed_secs: u64,
    elapsed: String,
}

pub fn run(action: TimerAction, global: &GlobalArgs, config: Config) -> CliResult {
    let mut ctx = Context::open(global, config)?;
    let user_id = ctx.user_id;

    match action {
        TimerAction::Start { id } => print_json(&ctx.service.start(id, user_id)?),
        TimerAction::Stop { id } => print_json(&ctx.service.stop(id, user_id)?),
        TimerAction::Complete { id } => print_json(&ctx.service.complete(id, user_id)?),
        TimerAction::Active => {
            let task = ctx.service.active(user_id)?;
            let elapsed_secs = task
                .as_ref()
                .map_or(0, |t| t.elapsed_at(ctx.service.now()));
            print_json(&ActiveTimer {
                task,
                elapsed_secs,
                elapsed: format_duration(elapsed_secs, ctx.config.display.show_seconds),
            })
        }
    }
}

/// `h:mm:ss`, or `h:mm` without seconds.
fn format_duration(secs: u64, show_seconds: bool) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if show_seconds {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_and_without_seconds() {
        assert_eq!(format_duration(0, true), "0:00:00");
        assert_eq!(format_duration(135, true), "0:02:15");
        assert_eq!(format_duration(3_725, true), "1:02:05");
        assert_eq!(format_duration(3_725, false), "1:02");
        assert_eq!(format_duration(90_000, false), "25:00");
    }
}
