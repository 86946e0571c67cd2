//! Extraction and storage of MetaNetX tables
//!
//! MetaNetX dumps are tab-separated without a header row; their column names
//! live in `#` comment lines and differ between releases, so the layout comes
//! from configuration. Inputs and outputs ending in `.gz` are (de)compressed
//! transparently.

use crate::config::SingleTableConfiguration;
use crate::error::TableError;
use clap::ValueEnum;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};

/// The six MNXref tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum TableKind {
    ChemProp,
    ChemXref,
    CompProp,
    CompXref,
    ReacProp,
    ReacXref,
}

impl TableKind {
    pub const ALL: [TableKind; 6] = [
        TableKind::ChemProp,
        TableKind::ChemXref,
        TableKind::CompProp,
        TableKind::CompXref,
        TableKind::ReacProp,
        TableKind::ReacXref,
    ];

    /// Name of the table on the server, without extension
    pub fn stem(self) -> &'static str {
        match self {
            TableKind::ChemProp => "chem_prop",
            TableKind::ChemXref => "chem_xref",
            TableKind::CompProp => "comp_prop",
            TableKind::CompXref => "comp_xref",
            TableKind::ReacProp => "reac_prop",
            TableKind::ReacXref => "reac_xref",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// In-memory table; empty cells are `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Values of one column
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = Option<&str>>, TableError> {
        let index = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .map(move |row| row.get(index).and_then(|value| value.as_deref())))
    }

    /// Append a row, padding or truncating it to the column count
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Read a table file with the given layout
pub fn extract_table(path: &Path, layout: &SingleTableConfiguration) -> Result<Table, TableError> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let table = read_table(reader, layout)?;
    debug!(path = %path.display(), rows = table.len(), "Extracted table");
    Ok(table)
}

/// Parse tab-separated rows with the given layout
///
/// Lines starting with `#` are comments. `skip` data rows are dropped after
/// that.
pub fn read_table<R: Read>(reader: R, layout: &SingleTableConfiguration) -> Result<Table, TableError> {
    let mut csv = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut table = Table::new(layout.columns.clone());
    let mut ragged = 0usize;

    for record in csv.records().skip(layout.skip) {
        let record = record?;
        if record.len() != table.columns.len() {
            ragged += 1;
        }
        let row = record
            .iter()
            .map(|field| (!field.is_empty()).then(|| field.to_string()))
            .collect();
        table.push_row(row);
    }

    if ragged > 0 {
        warn!(
            rows = ragged,
            columns = table.columns.len(),
            "Rows did not match the configured column count"
        );
    }

    Ok(table)
}

/// Write a table with a header row, gzip-compressed if `path` ends in `.gz`
pub fn write_table(path: &Path, table: &Table) -> Result<(), TableError> {
    let file = File::create(path)?;

    if is_gzip(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_table_to(&mut encoder, table)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        write_table_to(&mut writer, table)?;
        writer.flush()?;
    }

    debug!(path = %path.display(), rows = table.len(), "Stored table");
    Ok(())
}

/// Write a table as tab-separated text with a header row
pub fn write_table_to<W: Write>(writer: W, table: &Table) -> Result<(), TableError> {
    let mut csv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    csv.write_record(&table.columns)?;
    for row in &table.rows {
        csv.write_record(row.iter().map(|value| value.as_deref().unwrap_or("")))?;
    }
    csv.flush()?;
    Ok(())
}
