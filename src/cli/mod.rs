//! CLI command definitions for todo-migrate.
//!
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod migrate;
pub mod status;

use clap::{Parser, Subcommand};
use migrate::MigrateArgs;
use status::StatusArgs;

/// Import data from other task managers into the to-do service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Directory for attachment files (overrides config)
    #[arg(short, long, global = true)]
    pub files_dir: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate a provider export into a user's account
    Migrate(MigrateArgs),

    /// Show the latest migration run for a user
    Status(StatusArgs),
}
