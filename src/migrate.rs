//! Per-user migration lifecycle: decode, convert, load, record status.

use crate::convert::{self, ConvertContext};
use crate::db::Database;
use crate::db::status::MigrationStatus;
use crate::download::Downloader;
use crate::error::{MigrationError, MigrationResult};
use crate::files::FileStore;
use crate::forest::ImportForest;
use crate::load::{self, CancelFlag, LoadSummary};
use crate::source::{ProviderKind, Source};
use chrono::FixedOffset;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub status_id: i64,
    pub user_id: i64,
    pub provider: ProviderKind,
    pub summary: LoadSummary,
}

/// Runs migrations, at most one at a time per user.
pub struct Migrator {
    db: Database,
    files: Arc<dyn FileStore>,
    downloader: Arc<dyn Downloader>,
    timezone: FixedOffset,
    running: Mutex<HashSet<i64>>,
}

/// Holds a user's slot in [`Migrator::running`] until dropped.
struct RunGuard<'a> {
    running: &'a Mutex<HashSet<i64>>,
    user_id: i64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.user_id);
    }
}

impl Migrator {
    pub fn new(
        db: Database,
        files: Arc<dyn FileStore>,
        downloader: Arc<dyn Downloader>,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            db,
            files,
            downloader,
            timezone,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn acquire(&self, user_id: i64) -> MigrationResult<RunGuard<'_>> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(user_id) {
            warn!(user_id, "Rejected concurrent migration");
            return Err(MigrationError::AlreadyRunning(user_id));
        }
        Ok(RunGuard {
            running: &self.running,
            user_id,
        })
    }

    /// Migrate everything `source` provides into `user_id`'s account.
    ///
    /// The run is recorded in the status table whatever its outcome. A load
    /// failure leaves no rows and no stored files behind.
    pub fn run(
        &self,
        user_id: i64,
        source: &dyn Source,
        cancel: &CancelFlag,
    ) -> MigrationResult<MigrationReport> {
        self.run_with(user_id, source, cancel, |_| Ok(()))
    }

    /// Like [`run`](Self::run), handing the converted forest to `inspect`
    /// before it is loaded. An error from `inspect` fails the run.
    pub fn run_with<F>(
        &self,
        user_id: i64,
        source: &dyn Source,
        cancel: &CancelFlag,
        inspect: F,
    ) -> MigrationResult<MigrationReport>
    where
        F: FnOnce(&ImportForest) -> MigrationResult<()>,
    {
        let _guard = self.acquire(user_id)?;
        let provider = source.provider();
        let status_id = self.db.start_migration(user_id, provider.as_str())?;
        info!(user_id, provider = %provider, status_id, "Migration started");

        let outcome = self.execute(user_id, source, cancel, inspect);
        let recorded = self
            .db
            .finish_migration(status_id, outcome.as_ref().err());

        match (outcome, recorded) {
            (Ok(summary), Ok(())) => {
                info!(
                    user_id,
                    provider = %provider,
                    rows = summary.total(),
                    "Migration finished"
                );
                Ok(MigrationReport {
                    status_id,
                    user_id,
                    provider,
                    summary,
                })
            }
            (Ok(_), Err(e)) => {
                error!(user_id, status_id, "Failed to record migration status: {:#}", e);
                Err(e.into())
            }
            (Err(e), recorded) => {
                if let Err(status_err) = recorded {
                    error!(
                        user_id,
                        status_id, "Failed to record migration status: {:#}", status_err
                    );
                }
                error!(user_id, provider = %provider, code = %e.code(), "Migration failed: {}", e);
                Err(e)
            }
        }
    }

    fn execute<F>(
        &self,
        user_id: i64,
        source: &dyn Source,
        cancel: &CancelFlag,
        inspect: F,
    ) -> MigrationResult<LoadSummary>
    where
        F: FnOnce(&ImportForest) -> MigrationResult<()>,
    {
        let forest = self.convert(source)?;
        inspect(&forest)?;
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        self.db.transact_import(self.files.as_ref(), |store, files| {
            load::load(&forest, user_id, store, files, cancel).map(|(summary, _)| summary)
        })
    }

    /// Decode and convert without touching storage.
    pub fn convert(&self, source: &dyn Source) -> MigrationResult<ImportForest> {
        convert_source(source, self.downloader.as_ref(), self.timezone)
    }

    /// The latest run recorded for a user.
    pub fn status(&self, user_id: i64) -> MigrationResult<Option<MigrationStatus>> {
        Ok(self.db.latest_migration(user_id)?)
    }
}

/// Decode `source` and convert it into a validated forest.
pub fn convert_source(
    source: &dyn Source,
    downloader: &dyn Downloader,
    timezone: FixedOffset,
) -> MigrationResult<ImportForest> {
    let records = source.decode()?;
    let ctx = ConvertContext::new(timezone, downloader, source.auth_headers());
    convert::convert(&records, ctx)
}
