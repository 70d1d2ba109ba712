use clap::Subcommand;
use mattertime_core::Config;

use super::{print_json, CliResult, Context};
use crate::GlobalArgs;

#[derive(Subcommand)]
pub enum CategoryAction {
    /// List the task categories
    List,
}

pub fn run(action: CategoryAction, global: &GlobalArgs, config: Config) -> CliResult {
    let ctx = Context::open(global, config)?;
    match action {
        CategoryAction::List => print_json(&ctx.service.categories()?),
    }
}
