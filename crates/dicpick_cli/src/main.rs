//! `dicpick` command-line entry point.
//!
//! # Responsibility
//! - Parse flags (with `DICPICK_*` environment fallbacks) and dispatch to
//!   `dicpick_core` services.
//! - Print machine-readable JSON results on stdout.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "dicpick")]
#[command(about = "Volunteer task scheduling: fill open shifts fairly", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "DICPICK_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Absolute directory for rotating log files; logging is off when unset
    #[arg(long, env = "DICPICK_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DbArgs {
    /// Path to the SQLite database file
    #[arg(long, env = "DICPICK_DB")]
    db: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill open task slots of an event and print the report
    Assign {
        #[command(flatten)]
        store: DbArgs,
        #[arg(long)]
        event: Uuid,
        /// Restrict to these tasks (repeatable)
        #[arg(long = "task-id")]
        task_ids: Vec<Uuid>,
        #[arg(long)]
        task_type: Option<Uuid>,
        /// Restrict to one date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        /// Seed for the tie-break; omit for a random draw
        #[arg(long)]
        seed: Option<u64>,
        /// Abort without writing if any slot cannot be filled
        #[arg(long)]
        strict: bool,
    },
    /// Delete assignments of the given tasks
    Clear {
        #[command(flatten)]
        store: DbArgs,
        #[arg(long)]
        event: Uuid,
        #[arg(long = "task-id", required = true)]
        task_ids: Vec<Uuid>,
        /// Also delete manual assignments
        #[arg(long)]
        all: bool,
    },
    /// Print every participant's score standing
    Scores {
        #[command(flatten)]
        store: DbArgs,
        #[arg(long)]
        event: Uuid,
    },
    /// Seed a sample event and print its id
    Demo {
        #[command(flatten)]
        store: DbArgs,
    },
    /// Check that the core library is linked
    Ping,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_logging(cli.log_level.as_deref(), cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Assign {
            store,
            event,
            task_ids,
            task_type,
            date,
            seed,
            strict,
        } => commands::assign(
            &store.db,
            event,
            commands::selector(task_ids, task_type, date),
            seed,
            strict,
        )?,
        Commands::Clear {
            store,
            event,
            task_ids,
            all,
        } => commands::clear(&store.db, event, &task_ids, all)?,
        Commands::Scores { store, event } => commands::scores(&store.db, event)?,
        Commands::Demo { store } => commands::demo::seed(&store.db)?,
        Commands::Ping => {
            println!("dicpick_core ping={}", dicpick_core::ping());
            println!("dicpick_core version={}", dicpick_core::core_version());
        }
    }

    Ok(())
}
