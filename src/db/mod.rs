//! Database layer for imported projects, tasks and their satellites.

pub mod queries;
pub mod status;
pub mod store;

pub use store::{ImportStore, NewAttachment, NewProject, NewTask, SqliteStore};

use crate::error::MigrationResult;
use crate::files::{FileStore, StagedFiles};
use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.lock();
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    // Poisoning is ignored: SQLite rolls back an unfinished transaction itself.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock();
        f(&conn)
    }

    /// Run an import inside a single transaction.
    ///
    /// `f` receives a store bound to the transaction and a file store that
    /// remembers every blob written through it. If `f` (or the commit) fails,
    /// the transaction is rolled back and those blobs are deleted again, so a
    /// failed import leaves neither rows nor files behind.
    pub fn transact_import<T, F>(&self, files: &dyn FileStore, f: F) -> MigrationResult<T>
    where
        F: FnOnce(&mut SqliteStore<'_>, &dyn FileStore) -> MigrationResult<T>,
    {
        let staged = StagedFiles::new(files);
        let mut conn = self.lock();

        let outcome: MigrationResult<T> = (|| {
            let tx = conn.transaction()?;
            let value = {
                let mut store = SqliteStore::new(&tx);
                f(&mut store, &staged)?
            };
            tx.commit()?;
            Ok(value)
        })();

        if let Err(e) = &outcome {
            let staged_count = staged.staged().len();
            warn!(
                code = %e.code(),
                staged_files = staged_count,
                "Import rolled back"
            );
            staged.discard();
        }
        outcome
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::files::{DiskFileStore, FileMeta};
    use tempfile::TempDir;

    fn project(title: &str) -> NewProject<'_> {
        NewProject {
            owner_id: 1,
            parent_id: None,
            title,
            description: "",
            hex_color: "",
            archived: false,
            created_at: now_ms(),
        }
    }

    #[test]
    fn migrations_create_schema() {
        let db = Database::open_in_memory().unwrap();
        let tables: Vec<String> = db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .unwrap();
        for table in [
            "buckets",
            "label_tasks",
            "labels",
            "migration_status",
            "projects",
            "task_attachments",
            "task_comments",
            "task_relations",
            "task_reminders",
            "tasks",
        ] {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
    }

    #[test]
    fn transact_import_commits_on_success() {
        let db = Database::open_in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());

        let id = db
            .transact_import(&files, |store, _| Ok(store.create_project(&project("a"))?))
            .unwrap();

        assert!(id > 0);
        assert_eq!(db.row_counts().unwrap()["projects"], 1);
    }

    #[test]
    fn transact_import_rolls_back_rows_and_files() {
        let db = Database::open_in_memory().unwrap();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());
        let mut stored = None;

        let result: MigrationResult<()> = db.transact_import(&files, |store, files| {
            store.create_project(&project("a"))?;
            let meta = FileMeta {
                file_name: "a.txt",
                mime_type: "text/plain",
                owner_id: 1,
            };
            stored = Some(files.put(b"payload", &meta)?);
            Err(MigrationError::Cancelled)
        });

        assert!(matches!(result, Err(MigrationError::Cancelled)));
        assert_eq!(db.row_counts().unwrap()["projects"], 0);
        let stored = stored.unwrap();
        assert!(files.get(&stored).is_err());
    }
}
