//! Task management commands for CLI.

use clap::Subcommand;
use mattertime_core::{Config, NewTask, TaskStatus};

use super::{print_json, CliResult, Context};
use crate::GlobalArgs;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Matter or client reference
        #[arg(long)]
        matter: Option<String>,
        /// Category ID (see `category list`)
        #[arg(long)]
        category: Option<i64>,
    },
    /// List tasks, newest first
    List {
        /// Filter by status
        #[arg(long, value_parser = ["open", "completed"])]
        status: Option<String>,
    },
    /// Get task details
    Get {
        /// Task ID
        id: i64,
    },
    /// List the recorded timing sessions of a task
    Sessions {
        /// Task ID
        id: i64,
    },
}

pub fn run(action: TaskAction, global: &GlobalArgs, config: Config) -> CliResult {
    let mut ctx = Context::open(global, config)?;
    let user_id = ctx.user_id;

    match action {
        TaskAction::Create {
            title,
            description,
            matter,
            category,
        } => {
            let new = NewTask {
                title,
                description,
                matter,
                category_id: category,
            };
            let task = ctx.service.create_task(user_id, new)?;
            print_json(&task)?;
        }
        TaskAction::List { status } => {
            let status = status.as_deref().and_then(TaskStatus::parse);
            let tasks = ctx.service.list_tasks(user_id, status)?;
            print_json(&tasks)?;
        }
        TaskAction::Get { id } => {
            let task = ctx.service.get_task(id, user_id)?;
            print_json(&task)?;
        }
        TaskAction::Sessions { id } => {
            let sessions = ctx.service.sessions(id, user_id)?;
            print_json(&sessions)?;
        }
    }
    Ok(())
}
