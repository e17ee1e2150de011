//! Structured error types for migration runs.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling and the persisted run status.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Provider side
    DecodeFailed,
    DownloadFailed,

    // Conversion / validation
    InvalidForest,

    // Load side
    LoadFailed,
    Cancelled,

    // Orchestration
    AlreadyRunning,
    InvalidConfig,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Stable string form, as stored in `migration_status.error_code`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DecodeFailed => "DECODE_FAILED",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::InvalidForest => "INVALID_FOREST",
            ErrorCode::LoadFailed => "LOAD_FAILED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::AlreadyRunning => "ALREADY_RUNNING",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of record the loader writes; names the culprit when a write fails.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Bucket,
    Label,
    Task,
    File,
    Attachment,
    Comment,
    Reminder,
    Relation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Project => "project",
            EntityKind::Bucket => "bucket",
            EntityKind::Label => "label",
            EntityKind::Task => "task",
            EntityKind::File => "file",
            EntityKind::Attachment => "attachment",
            EntityKind::Comment => "comment",
            EntityKind::Reminder => "reminder",
            EntityKind::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// Everything that can abort a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to decode {provider} export: {reason}")]
    Decode {
        provider: &'static str,
        reason: String,
    },

    #[error("failed to download attachment from {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("invalid import forest: {0}")]
    InvalidForest(String),

    #[error("failed to create {entity} {placeholder}: {source:#}")]
    Load {
        entity: EntityKind,
        placeholder: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("migration cancelled")]
    Cancelled,

    #[error("a migration is already running for user {0}")]
    AlreadyRunning(i64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MigrationError {
    pub fn decode(provider: &'static str, reason: impl fmt::Display) -> Self {
        Self::Decode {
            provider,
            reason: reason.to_string(),
        }
    }

    pub fn download(url: &str, reason: impl fmt::Display) -> Self {
        Self::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn load(entity: EntityKind, placeholder: impl fmt::Display, source: anyhow::Error) -> Self {
        Self::Load {
            entity,
            placeholder: placeholder.to_string(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MigrationError::Decode { .. } => ErrorCode::DecodeFailed,
            MigrationError::Download { .. } => ErrorCode::DownloadFailed,
            MigrationError::InvalidForest(_) => ErrorCode::InvalidForest,
            MigrationError::Load { .. } => ErrorCode::LoadFailed,
            MigrationError::Cancelled => ErrorCode::Cancelled,
            MigrationError::AlreadyRunning(_) => ErrorCode::AlreadyRunning,
            MigrationError::Config(_) => ErrorCode::InvalidConfig,
            MigrationError::Database(_) => ErrorCode::DatabaseError,
            MigrationError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

/// Result type for migration operations.
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn load_error_names_entity_and_placeholder() {
        let err = MigrationError::load(EntityKind::Task, "#3", anyhow!("disk full"));
        assert_eq!(err.to_string(), "failed to create task #3: disk full");
        assert_eq!(err.code(), ErrorCode::LoadFailed);
    }

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::AlreadyRunning).unwrap();
        assert_eq!(json, "\"ALREADY_RUNNING\"");
        assert_eq!(ErrorCode::AlreadyRunning.as_str(), "ALREADY_RUNNING");
    }
}
