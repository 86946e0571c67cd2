//! `mnx report` command implementation

use super::load_configuration;
use crate::report::{duplicates, intcomma, value_count};
use crate::table::{extract_table, TableKind};
use anyhow::{Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::path::PathBuf;

/// Percentage precision of the value counts
const DIGITS: usize = 2;

/// Print per-column value counts, and optionally repeated values
pub fn run(
    kind: TableKind,
    input: PathBuf,
    duplicates_column: Option<String>,
    release: Option<String>,
    config: Option<PathBuf>,
) -> Result<()> {
    let configuration = load_configuration(config.as_deref(), release.as_deref())?;
    let data = extract_table(&input, configuration.tables.get(kind))
        .with_context(|| format!("Failed to read '{}'", input.display()))?;
    if data.is_empty() {
        anyhow::bail!("'{}' contains no rows", input.display());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Column", "Non-empty"]);
    for column in &data.columns {
        table.add_row(vec![column.clone(), value_count(&data, column, DIGITS)?]);
    }
    println!("{} ({} rows)", kind, intcomma(data.len()));
    println!("{}", table);

    if let Some(column) = duplicates_column {
        let repeated: Vec<(String, usize)> = duplicates(&data, &column)?
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .collect();

        if repeated.is_empty() {
            println!("No repeated values in '{}'", column);
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![column.as_str(), "Count"]);
        for (value, count) in &repeated {
            table.add_row(vec![value.clone(), intcomma(*count)]);
        }
        println!("{} repeated value(s) in '{}'", intcomma(repeated.len()), column);
        println!("{}", table);
    }

    Ok(())
}
