//! Persistent record of migration runs.

use super::{Database, now_ms};
use crate::error::MigrationError;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Succeeded,
    Failed,
}

/// One migration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl MigrationStatus {
    pub fn state(&self) -> RunState {
        match (self.finished_at, &self.error_code) {
            (None, _) => RunState::Running,
            (Some(_), None) => RunState::Succeeded,
            (Some(_), Some(_)) => RunState::Failed,
        }
    }
}

impl Database {
    /// Record the start of a run and return its status id.
    pub fn start_migration(&self, user_id: i64, provider: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO migration_status (user_id, provider, started_at) VALUES (?1, ?2, ?3)",
                params![user_id, provider, now_ms()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Mark a run finished, with the error that ended it if any.
    pub fn finish_migration(&self, status_id: i64, error: Option<&MigrationError>) -> Result<()> {
        let (code, message) = match error {
            Some(e) => (Some(e.code().as_str()), Some(e.to_string())),
            None => (None, None),
        };
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE migration_status
                 SET finished_at = ?1, error_code = ?2, error_message = ?3
                 WHERE id = ?4",
                params![now_ms(), code, message, status_id],
            )?;
            if updated == 0 {
                anyhow::bail!("migration status {} not found", status_id);
            }
            Ok(())
        })
    }

    /// The most recent run for a user.
    pub fn latest_migration(&self, user_id: i64) -> Result<Option<MigrationStatus>> {
        self.with_conn(|conn| {
            let status = conn
                .query_row(
                    "SELECT id, user_id, provider, started_at, finished_at,
                            error_code, error_message
                     FROM migration_status WHERE user_id = ?1 ORDER BY id DESC LIMIT 1",
                    params![user_id],
                    |row| {
                        Ok(MigrationStatus {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            provider: row.get(2)?,
                            started_at: row.get(3)?,
                            finished_at: row.get(4)?,
                            error_code: row.get(5)?,
                            error_message: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(status)
        })
    }
}
