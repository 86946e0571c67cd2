//! Caller-facing operations

use crate::config::Configuration;
use crate::fetcher::Fetcher;
use crate::ftp::FtpConnector;
use crate::models::{SyncReport, SyncRequest};
use crate::table::{extract_table, write_table, TableKind};
use crate::transform::{transform_table, TransformSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use std::path::Path;
use tracing::info;

/// Options of [`pull`]
#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Files to pull; the configured defaults when `None`
    pub files: Option<Vec<String>>,

    /// Configuration to use; the packaged one when `None`
    pub configuration: Option<Configuration>,

    /// End of the previous run; `None` means never checked
    pub last_checked: Option<DateTime<FixedOffset>>,

    /// Gzip the local copies
    pub compress: bool,

    /// Draw download progress bars
    pub show_progress: bool,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            files: None,
            configuration: None,
            last_checked: None,
            compress: true,
            show_progress: false,
        }
    }
}

/// Pull missing or changed files from the MetaNetX FTP server
///
/// The returned report's `checked_at` is the value to pass as
/// `last_checked` next time.
pub async fn pull(directory: impl AsRef<Path>, options: PullOptions) -> Result<SyncReport> {
    let directory = directory.as_ref();
    let configuration = match options.configuration {
        Some(configuration) => configuration,
        None => Configuration::load(None).context("Failed to load packaged configuration")?,
    };

    let request = SyncRequest::from_configuration(
        &configuration.ftp,
        directory,
        options.files,
        options.last_checked,
        options.compress,
    )?;

    info!(
        host = %request.host,
        directory = %request.remote_directory(),
        files = request.filenames.len(),
        "Pulling MetaNetX tables"
    );

    let fetcher = Fetcher::new(FtpConnector::new(&configuration.ftp))
        .with_progress(options.show_progress);

    fetcher
        .synchronize(&request)
        .await
        .with_context(|| format!("Failed to synchronize into '{}'", directory.display()))
}

/// Extract, remap and store one table
pub fn process_table(
    input: &Path,
    output: &Path,
    kind: TableKind,
    configuration: &Configuration,
) -> Result<TransformSummary> {
    let layout = configuration.tables.get(kind);
    let rules = configuration.remap.for_table(kind);

    info!(table = %kind, input = %input.display(), "Extracting");
    let table = extract_table(input, layout)
        .with_context(|| format!("Failed to read '{}'", input.display()))?;

    info!(table = %kind, rows = table.len(), "Transforming");
    let (processed, summary) = transform_table(&table, &layout.source_column, rules)?;

    info!(table = %kind, output = %output.display(), "Storing");
    write_table(output, &processed)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;

    Ok(summary)
}
