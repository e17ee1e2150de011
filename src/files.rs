//! File storage for attachment payloads.
//!
//! Blobs live on disk under a files directory, named by a generated id; the
//! database only keeps the id.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier returned by [`FileStore::put`].
pub type FileId = String;

/// Metadata accompanying a stored blob.
#[derive(Debug, Clone)]
pub struct FileMeta<'a> {
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub owner_id: i64,
}

pub trait FileStore: Send + Sync {
    fn put(&self, bytes: &[u8], meta: &FileMeta<'_>) -> Result<FileId>;
    fn get(&self, id: &str) -> Result<Vec<u8>>;
    fn delete(&self, id: &str) -> Result<()>;
}

/// Blob store backed by a directory.
#[derive(Debug, Clone)]
pub struct DiskFileStore {
    dir: PathBuf,
}

impl DiskFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        // Ids are generated uuids; anything else must not escape the directory.
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Err(anyhow!("invalid file id: {}", id));
        }
        Ok(self.dir.join(id))
    }
}

impl FileStore for DiskFileStore {
    fn put(&self, bytes: &[u8], meta: &FileMeta<'_>) -> Result<FileId> {
        std::fs::create_dir_all(&self.dir)?;
        let id = Uuid::new_v4().to_string();
        std::fs::write(self.path_for(&id)?, bytes)?;
        debug!(
            file_id = %id,
            size = bytes.len(),
            mime_type = meta.mime_type,
            owner = meta.owner_id,
            "Stored file"
        );
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.path_for(id)?)?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        std::fs::remove_file(self.path_for(id)?)?;
        Ok(())
    }
}

/// Records every id put through it so a failed run can remove them again.
pub struct StagedFiles<'a> {
    inner: &'a dyn FileStore,
    staged: Mutex<Vec<FileId>>,
}

impl<'a> StagedFiles<'a> {
    pub fn new(inner: &'a dyn FileStore) -> Self {
        Self {
            inner,
            staged: Mutex::new(Vec::new()),
        }
    }

    pub fn staged(&self) -> Vec<FileId> {
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Delete every staged file. Failures are logged, not returned.
    pub fn discard(&self) {
        let ids = std::mem::take(&mut *self.staged.lock().unwrap_or_else(|e| e.into_inner()));
        for id in ids {
            if let Err(e) = self.inner.delete(&id) {
                warn!(file_id = %id, "Failed to remove staged file: {:#}", e);
            }
        }
    }
}

impl FileStore for StagedFiles<'_> {
    fn put(&self, bytes: &[u8], meta: &FileMeta<'_>) -> Result<FileId> {
        let id = self.inner.put(bytes, meta)?;
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id.clone());
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Vec<u8>> {
        self.inner.get(id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id)?;
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|staged| staged != id);
        Ok(())
    }
}
