//! `status` subcommand: show the latest migration run for a user.

use crate::config::Config;
use crate::db::Database;
use crate::db::status::RunState;
use anyhow::Result;
use chrono::DateTime;
use clap::Args;

/// Arguments for the status subcommand
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Id of the user to report on
    #[arg(short, long)]
    pub user: i64,

    /// Print the raw status record as JSON
    #[arg(long)]
    pub json: bool,
}

fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

/// Run the status command.
pub fn run_status(config: &Config, args: &StatusArgs) -> Result<()> {
    let db = Database::open(&config.server.db_path)?;
    let Some(status) = db.latest_migration(args.user)? else {
        println!("No migration recorded for user {}", args.user);
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let state = match status.state() {
        RunState::Running => "running",
        RunState::Succeeded => "succeeded",
        RunState::Failed => "failed",
    };
    println!("Run {} for user {}: {}", status.id, status.user_id, state);
    println!("  provider: {}", status.provider);
    println!("  started:  {}", format_ms(status.started_at));
    if let Some(finished) = status.finished_at {
        println!("  finished: {}", format_ms(finished));
    }
    if let (Some(code), Some(message)) = (&status.error_code, &status.error_message) {
        println!("  error:    {} ({})", message, code);
    }
    Ok(())
}
