//! `migrate` subcommand: import a provider export for one user.

use crate::config::Config;
use crate::db::Database;
use crate::download::HttpDownloader;
use crate::error::MigrationError;
use crate::files::DiskFileStore;
use crate::forest::ImportForest;
use crate::load::CancelFlag;
use crate::migrate::{Migrator, convert_source};
use crate::source::{ExportFileSource, ProviderKind};
use anyhow::{Context, Result, anyhow};
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// Todoist sync API export (JSON)
    Todoist,
    /// Trello board or account export (JSON)
    Trello,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Todoist => ProviderKind::Todoist,
            ProviderArg::Trello => ProviderKind::Trello,
        }
    }
}

/// Arguments for the migrate subcommand
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Provider the export comes from
    #[arg(short, long, value_enum)]
    pub provider: ProviderArg,

    /// Id of the user receiving the data
    #[arg(short, long)]
    pub user: i64,

    /// Path to the export file (`.gz` is decompressed)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Header sent with every attachment download, as `Name: value`
    #[arg(long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Convert and validate without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Write the converted forest as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub dump_forest: Option<PathBuf>,
}

/// Split `Name: value` into its parts.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header must look like 'Name: value', got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("header name is empty in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl MigrateArgs {
    pub fn source(&self) -> Result<ExportFileSource> {
        let mut source = ExportFileSource::new(self.provider.into(), &self.file);
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            source = source.with_header(name, value);
        }
        Ok(source)
    }
}

fn print_forest_counts(forest: &ImportForest) {
    let buckets: usize = forest.projects.iter().map(|p| p.buckets.len()).sum();
    let attachments: usize = forest.tasks.iter().map(|t| t.attachments.len()).sum();
    let comments: usize = forest.tasks.iter().map(|t| t.comments.len()).sum();
    println!("  projects:    {}", forest.projects.len());
    println!("  buckets:     {}", buckets);
    println!("  tasks:       {}", forest.tasks.len());
    println!("  labels:      {}", forest.labels.len());
    println!("  attachments: {}", attachments);
    println!("  comments:    {}", comments);
}

fn write_forest(path: &Path, forest: &ImportForest) -> Result<()> {
    let file =
        std::fs::File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(file, forest)?;
    info!(path = %path.display(), "Wrote import forest");
    Ok(())
}

/// Run the migrate command.
pub fn run_migrate(config: &Config, args: &MigrateArgs) -> Result<()> {
    let timezone = config.timezone()?;
    let source = args.source()?;
    let downloader = Arc::new(HttpDownloader::new(
        config.download.timeout(),
        config.download.max_retries,
    )?);

    if args.dry_run {
        let forest = convert_source(&source, downloader.as_ref(), timezone)?;
        if let Some(path) = &args.dump_forest {
            write_forest(path, &forest)?;
        }
        println!(
            "Dry run: {} export converted, nothing written",
            ProviderKind::from(args.provider)
        );
        print_forest_counts(&forest);
        return Ok(());
    }

    config.ensure_dirs()?;
    let db = Database::open(&config.server.db_path)?;
    let files = Arc::new(DiskFileStore::new(&config.server.files_dir));
    let migrator = Migrator::new(db, files, downloader, timezone);

    let report = migrator.run_with(args.user, &source, &CancelFlag::new(), |forest| {
        match &args.dump_forest {
            Some(path) => write_forest(path, forest).map_err(MigrationError::from),
            None => Ok(()),
        }
    })?;
    println!(
        "Migrated {} export for user {} (run {}):",
        report.provider, report.user_id, report.status_id
    );
    for (kind, count) in &report.summary.created {
        println!("  {}: {}", kind, count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parsing() {
        assert_eq!(
            parse_header("Authorization: OAuth oauth_token=\"x\"").unwrap(),
            ("Authorization".to_string(), "OAuth oauth_token=\"x\"".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn source_carries_headers() {
        let args = MigrateArgs {
            provider: ProviderArg::Todoist,
            user: 1,
            file: PathBuf::from("sync.json.gz"),
            headers: vec!["X-Token: abc".to_string()],
            dry_run: false,
            dump_forest: None,
        };
        let source = args.source().unwrap();
        assert!(source.is_gzipped());
        assert_eq!(
            crate::source::Source::auth_headers(&source),
            vec![("X-Token".to_string(), "abc".to_string())]
        );
    }
}
