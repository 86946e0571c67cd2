//! `mnx process` command implementation

use super::load_configuration;
use crate::api;
use crate::table::TableKind;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

/// Extract and remap one table
pub fn run(
    table: TableKind,
    input: PathBuf,
    output: PathBuf,
    release: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input '{}' is not a file", input.display());
    }

    let configuration = load_configuration(config.as_deref(), release.as_deref())?;
    let summary = api::process_table(&input, &output, table, &configuration)
        .with_context(|| format!("Failed to process {} table", table))?;

    println!(
        "Processed {} rows of {} into '{}'",
        summary.rows,
        table,
        output.display()
    );
    if !summary.unmapped_prefixes.is_empty() {
        let unmapped: Vec<&str> = summary.unmapped_prefixes.iter().map(String::as_str).collect();
        println!("Prefixes without registry mapping: {}", unmapped.join(", "));
    }

    info!(table = %table, rows = summary.rows, "Complete");
    Ok(())
}
