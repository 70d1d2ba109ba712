use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mattertime_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "mattertime", version, about = "Mattertime task timer CLI")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Act as this user instead of the configured `user_id`
    #[arg(long, global = true)]
    pub user: Option<i64>,
    /// Database file to use instead of the configured one
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Task categories
    Category {
        #[command(subcommand)]
        action: commands::category::CategoryAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_env("MATTERTIME_LOG")
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout carries JSON, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    // A broken config file must not stop `config reset` from fixing it.
    let config = Config::load();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_filter.as_str())
            .unwrap_or("warn"),
    );

    let global = cli.global;
    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Task { action } => config
            .map_err(Into::into)
            .and_then(|config| commands::task::run(action, &global, config)),
        Commands::Timer { action } => config
            .map_err(Into::into)
            .and_then(|config| commands::timer::run(action, &global, config)),
        Commands::Category { action } => config
            .map_err(Into::into)
            .and_then(|config| commands::category::run(action, &global, config)),
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
