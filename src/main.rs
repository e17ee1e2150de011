//! todo-migrate
//!
//! Imports a user's projects, tasks, labels and attachments from a
//! third-party task manager export.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use todo_migrate::cli::migrate::run_migrate;
use todo_migrate::cli::status::run_status;
use todo_migrate::cli::{Cli, Command};
use todo_migrate::config::Config;
use todo_migrate::logging::{self, LogTarget};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::resolve(cli.config.as_deref().map(Path::new))?;

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(files_dir) = &cli.files_dir {
        config.server.files_dir = files_dir.into();
    }
    debug!(
        db_path = %config.server.db_path.display(),
        files_dir = %config.server.files_dir.display(),
        timezone = %config.server.timezone,
        "Configuration resolved"
    );

    match &cli.command {
        Command::Migrate(args) => run_migrate(&config, args)?,
        Command::Status(args) => run_status(&config, args)?,
    }

    Ok(())
}
