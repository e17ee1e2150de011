//! Configuration loading and management.

use crate::convert::dates::parse_offset;
use crate::error::{MigrationError, MigrationResult};
use anyhow::Result;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "todo-migrate.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub download: DownloadConfig,
}

/// Where imported data goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding attachment blobs.
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,

    /// Service timezone as a fixed UTC offset, e.g. `+02:00`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            files_dir: default_files_dir(),
            timezone: default_timezone(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".todo-migrate/todo.db")
}

fn default_files_dir() -> PathBuf {
    PathBuf::from(".todo-migrate/files")
}

fn default_timezone() -> String {
    "+00:00".to_string()
}

/// Attachment download limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Extra attempts after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `explicit` if given, else from the first default location
    /// that exists, else defaults. Environment overrides apply on top.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::default_locations()
                .into_iter()
                .find(|path| path.is_file())
                .map(Self::load)
                .transpose()?
                .unwrap_or_default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("todo-migrate").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Apply `TODO_MIGRATE_*` overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db_path) = lookup("TODO_MIGRATE_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(files_dir) = lookup("TODO_MIGRATE_FILES_DIR") {
            self.server.files_dir = PathBuf::from(files_dir);
        }

        if let Some(timezone) = lookup("TODO_MIGRATE_TIMEZONE") {
            self.server.timezone = timezone;
        }
    }

    /// The configured service timezone.
    pub fn timezone(&self) -> MigrationResult<FixedOffset> {
        parse_offset(&self.server.timezone).ok_or_else(|| {
            MigrationError::Config(format!(
                "timezone must be a UTC offset like +02:00, got '{}'",
                self.server.timezone
            ))
        })
    }

    /// Ensure the database and files directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.server.files_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  timezone: \"+02:00\"\ndownload:\n  max_retries: 1\n")
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.timezone, "+02:00");
        assert_eq!(config.server.db_path, default_db_path());
        assert_eq!(config.download.max_retries, 1);
        assert_eq!(config.download.timeout_seconds, 30);
        assert_eq!(
            config.timezone().unwrap(),
            FixedOffset::east_opt(7200).unwrap()
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            ("TODO_MIGRATE_DB_PATH", "/tmp/x.db"),
            ("TODO_MIGRATE_TIMEZONE", "-05:00"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.server.files_dir, default_files_dir());
        assert_eq!(config.timezone().unwrap(), FixedOffset::west_opt(5 * 3600).unwrap());
    }

    #[test]
    fn bad_timezone_is_config_error() {
        let mut config = Config::default();
        config.server.timezone = "Europe/Berlin".to_string();
        assert!(matches!(config.timezone(), Err(MigrationError::Config(_))));
    }

    #[test]
    fn explicit_missing_file_is_error() {
        assert!(Config::resolve(Some(Path::new("/nonexistent/todo-migrate.yaml"))).is_err());
    }
}
