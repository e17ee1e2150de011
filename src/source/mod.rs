//! Provider export decoding.
//!
//! Fetching from a provider's API is outside this crate; a [`Source`] hands
//! over an already-obtained export (sync response, board export) and the
//! headers needed to download the files it references.

pub mod todoist;
pub mod trello;

use crate::error::{MigrationError, MigrationResult};
use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;

pub use todoist::TodoistSync;
pub use trello::TrelloExport;

/// Supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Todoist,
    Trello,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Todoist => "todoist",
            ProviderKind::Trello => "trello",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "todoist" => Ok(ProviderKind::Todoist),
            "trello" => Ok(ProviderKind::Trello),
            other => Err(MigrationError::Config(format!("unknown provider: {}", other))),
        }
    }
}

/// Decoded provider payload, ready for conversion.
#[derive(Debug, Clone)]
pub enum ProviderRecords {
    Todoist(TodoistSync),
    Trello(TrelloExport),
}

impl ProviderRecords {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderRecords::Todoist(_) => ProviderKind::Todoist,
            ProviderRecords::Trello(_) => ProviderKind::Trello,
        }
    }
}

/// Where a migration's provider data comes from.
pub trait Source: Send + Sync {
    fn provider(&self) -> ProviderKind;

    fn decode(&self) -> MigrationResult<ProviderRecords>;

    /// Headers injected into every attachment download.
    fn auth_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Parse a raw export for `provider`.
pub fn decode_bytes(provider: ProviderKind, bytes: &[u8]) -> MigrationResult<ProviderRecords> {
    let name = provider.as_str();
    match provider {
        ProviderKind::Todoist => serde_json::from_slice::<TodoistSync>(bytes)
            .map(ProviderRecords::Todoist)
            .map_err(|e| MigrationError::decode(name, e)),
        ProviderKind::Trello => trello::parse_export(bytes)
            .map(ProviderRecords::Trello)
            .map_err(|e| MigrationError::decode(name, e)),
    }
}

/// An export file on disk, optionally gzip-compressed.
#[derive(Debug, Clone)]
pub struct ExportFileSource {
    provider: ProviderKind,
    path: PathBuf,
    headers: Vec<(String, String)>,
}

impl ExportFileSource {
    pub fn new(provider: ProviderKind, path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            path: path.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_gzipped(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "gz")
    }

    fn read(&self) -> std::io::Result<Vec<u8>> {
        let raw = std::fs::read(&self.path)?;
        if !self.is_gzipped() {
            return Ok(raw);
        }
        let mut decoded = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
        Ok(decoded)
    }
}

impl Source for ExportFileSource {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn decode(&self) -> MigrationResult<ProviderRecords> {
        let bytes = self.read().map_err(|e| {
            MigrationError::decode(
                self.provider.as_str(),
                format!("cannot read {}: {}", self.path.display(), e),
            )
        })?;
        decode_bytes(self.provider, &bytes)
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }
}

/// Provider ids arrive as strings or integers depending on API version.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Str(String),
    Int(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Str(s) => s,
            RawId::Int(i) => i.to_string(),
        }
    }
}

pub(crate) fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(RawId::deserialize(d)?.into_string())
}

/// Optional id; `null`, `""` and `0` mean absent.
pub(crate) fn de_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?
        .map(RawId::into_string)
        .filter(|id| !id.is_empty() && id != "0"))
}

pub(crate) fn de_ids<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<RawId>>::deserialize(d)?
        .unwrap_or_default()
        .into_iter()
        .map(RawId::into_string)
        .collect())
}
