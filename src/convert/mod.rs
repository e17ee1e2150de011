//! Conversion of decoded provider records into an [`ImportForest`].
//!
//! Conversion runs entirely in memory; the only I/O is attachment downloads
//! through the borrowed [`Downloader`]. A failed download aborts the whole
//! conversion, while dangling references are logged and dropped.

pub mod dates;
pub mod html;
pub mod todoist;
pub mod trello;

use crate::download::Downloader;
use crate::error::MigrationResult;
use crate::forest::{ImportForest, ImportProject, Label, LabelRef, Timestamp};
use crate::source::ProviderRecords;
use chrono::FixedOffset;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// State scoped to a single conversion run.
pub struct ConvertContext<'a> {
    forest: ImportForest,
    next_project_id: i64,
    /// Provider-native label id -> label already added to the forest.
    labels: HashMap<String, LabelRef>,
    timezone: FixedOffset,
    downloader: &'a dyn Downloader,
    auth_headers: Vec<(String, String)>,
}

impl<'a> ConvertContext<'a> {
    pub fn new(
        timezone: FixedOffset,
        downloader: &'a dyn Downloader,
        auth_headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            forest: ImportForest::new(),
            next_project_id: 1,
            labels: HashMap::new(),
            timezone,
            downloader,
            auth_headers,
        }
    }

    pub fn forest(&self) -> &ImportForest {
        &self.forest
    }

    pub fn forest_mut(&mut self) -> &mut ImportForest {
        &mut self.forest
    }

    /// Next project placeholder id. Never reused within a run.
    pub fn next_project_id(&mut self) -> i64 {
        let id = self.next_project_id;
        self.next_project_id += 1;
        id
    }

    /// Add a synthetic root project and return its index.
    pub fn add_root(&mut self, title: &str) -> usize {
        let id = self.next_project_id();
        self.forest.add_project(ImportProject::new(id, title))
    }

    /// The label for a provider-native id, created on first use.
    pub fn label(&mut self, native_id: &str, make: impl FnOnce() -> Label) -> LabelRef {
        if let Some(existing) = self.labels.get(native_id) {
            return *existing;
        }
        let label = self.forest.add_label(make());
        self.labels.insert(native_id.to_string(), label);
        label
    }

    /// Parse and normalize a provider timestamp. Unparseable values are logged
    /// and dropped.
    pub fn timestamp(&self, raw: &str) -> Option<Timestamp> {
        let parsed = dates::parse_timestamp(raw, self.timezone);
        if parsed.is_none() && !raw.trim().is_empty() {
            warn!(value = raw, "Ignoring unparseable timestamp");
        }
        parsed
    }

    pub fn opt_timestamp(&self, raw: Option<&str>) -> Option<Timestamp> {
        raw.and_then(|raw| self.timestamp(raw))
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// Download a referenced file. Failures are fatal for the run.
    pub fn download(&self, url: &str) -> MigrationResult<Vec<u8>> {
        debug!("Downloading attachment");
        self.downloader.download(url, &self.auth_headers)
    }

    /// Validate and hand over the finished forest.
    pub fn finish(self) -> MigrationResult<ImportForest> {
        self.forest.validate()?;
        Ok(self.forest)
    }
}

/// Convert decoded provider records into a validated forest.
pub fn convert(
    records: &ProviderRecords,
    mut ctx: ConvertContext<'_>,
) -> MigrationResult<ImportForest> {
    let provider = records.provider();
    match records {
        ProviderRecords::Todoist(sync) => todoist::convert(sync, &mut ctx)?,
        ProviderRecords::Trello(export) => trello::convert(export, &mut ctx)?,
    }
    let forest = ctx.finish()?;
    info!(
        provider = %provider,
        projects = forest.projects.len(),
        tasks = forest.tasks.len(),
        labels = forest.labels.len(),
        "Converted provider data"
    );
    Ok(forest)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::MigrationError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bytes per url and records the headers it was called with.
    #[derive(Default)]
    pub struct StubDownloader {
        pub files: HashMap<String, Vec<u8>>,
        pub calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl StubDownloader {
        pub fn with(mut self, url: &str, bytes: &[u8]) -> Self {
            self.files.insert(url.to_string(), bytes.to_vec());
            self
        }
    }

    impl Downloader for StubDownloader {
        fn download(&self, url: &str, headers: &[(String, String)]) -> MigrationResult<Vec<u8>> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), headers.to_vec()));
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| MigrationError::download(url, "HTTP 404 Not Found"))
        }
    }

    pub fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{StubDownloader, utc};
    use super::*;

    #[test]
    fn labels_are_deduplicated_by_native_id() {
        let downloader = StubDownloader::default();
        let mut ctx = ConvertContext::new(utc(), &downloader, Vec::new());
        let make = |title: &str| {
            let title = title.to_string();
            move || Label {
                title,
                color_hex: String::new(),
            }
        };

        let a = ctx.label("1", make("urgent"));
        let b = ctx.label("1", make("ignored"));
        // Same title, different provider id: a distinct label.
        let c = ctx.label("2", make("urgent"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(ctx.forest().labels.len(), 2);
        assert_eq!(ctx.forest().label(a).title, "urgent");
    }

    #[test]
    fn project_ids_are_sequential_from_one() {
        let downloader = StubDownloader::default();
        let mut ctx = ConvertContext::new(utc(), &downloader, Vec::new());
        let root = ctx.add_root("root");
        assert_eq!(ctx.forest().projects[root].placeholder_id, 1);
        assert_eq!(ctx.next_project_id(), 2);
        assert_eq!(ctx.next_project_id(), 3);
    }

    #[test]
    fn download_passes_auth_headers() {
        let downloader = StubDownloader::default().with("https://files/a", b"abc");
        let headers = vec![("Authorization".to_string(), "Bearer t".to_string())];
        let ctx = ConvertContext::new(utc(), &downloader, headers.clone());
        assert_eq!(ctx.download("https://files/a").unwrap(), b"abc");
        assert!(ctx.download("https://files/missing").is_err());
        assert_eq!(downloader.calls.lock().unwrap()[0].1, headers);
    }
}
