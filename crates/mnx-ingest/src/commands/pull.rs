//! `mnx pull` command implementation
//!
//! Reads the previous check from `last.txt`, synchronizes, prints a summary
//! and records the new check. The state file is only advanced when every
//! file succeeded, so failed files are retried on the next run.

use super::load_configuration;
use crate::api::{self, PullOptions};
use crate::models::{FileOutcome, SyncReport};
use crate::progress::format_bytes;
use crate::state;
use anyhow::{bail, Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::path::{Path, PathBuf};
use tracing::info;

/// Pull missing or outdated files into `directory`
pub async fn run(
    directory: PathBuf,
    files: Vec<String>,
    compress: bool,
    release: Option<String>,
    config: Option<PathBuf>,
    show_progress: bool,
) -> Result<()> {
    let configuration = load_configuration(config.as_deref(), release.as_deref())?;
    let timezone = configuration.ftp.server_timezone()?;

    let last_checked = state::read_last_checked(&directory, timezone).with_context(|| {
        format!(
            "Failed to read '{}'",
            state::state_path(&directory).display()
        )
    })?;

    let options = PullOptions {
        files: (!files.is_empty()).then_some(files),
        configuration: Some(configuration),
        last_checked,
        compress,
        show_progress,
    };

    let report = api::pull(&directory, options).await?;
    print!("{}", format_report(&report, &directory));

    let failed = report.failed().count();
    if failed > 0 {
        bail!(
            "{} of {} file(s) failed to synchronize; '{}' was not updated",
            failed,
            report.files.len(),
            state::STATE_FILENAME
        );
    }

    state::write_last_checked(&directory, &report.checked_at)?;
    info!(checked_at = %report.checked_at, "Recorded synchronization time");
    Ok(())
}

/// Render the per-file outcome as a table
fn format_report(report: &SyncReport, directory: &Path) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["File", "Status", "Local copy", "Details"]);

    for file in &report.files {
        let local = file
            .local_path
            .strip_prefix(directory)
            .unwrap_or(&file.local_path)
            .display()
            .to_string();
        let details = match &file.outcome {
            FileOutcome::UpToDate => String::new(),
            FileOutcome::Complete { bytes } => format_bytes(*bytes),
            FileOutcome::Failed { reason } => reason.clone(),
        };
        table.add_row(vec![
            file.filename.clone(),
            file.outcome.state().to_string(),
            local,
            details,
        ]);
    }

    format!(
        "{}\n{} downloaded ({}), {} up to date, {} failed\n",
        table,
        report.downloaded().count(),
        format_bytes(report.bytes_transferred()),
        report.up_to_date().count(),
        report.failed().count()
    )
}
