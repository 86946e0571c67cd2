//! Prefix remapping of cross-references
//!
//! MetaNetX writes references as `prefix:identifier`, using its own resource
//! names. The remapping splits them, renames the resource to its registry
//! name and applies per-resource rules: identifier prefixes (`CHEBI:`),
//! renames (`slm` to `swisslipid`) and splits by the identifier's initial
//! letter (KEGG). Values without a prefix are MetaNetX identifiers and get
//! the domain's namespace.

use crate::error::TableError;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Separator between resource prefix and identifier
pub const PREFIX_SEPARATOR: char = ':';

/// Remapping rules for one identifier domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapRules {
    /// Prefix given to values without a resource prefix
    pub namespace: String,

    /// MetaNetX resource name to registry name
    #[serde(default)]
    pub registries: BTreeMap<String, String>,

    /// Applied in order, after the registry mapping
    #[serde(default)]
    pub rules: Vec<PrefixRule>,

    /// Match resource names regardless of case
    #[serde(default)]
    pub ignore_case: bool,
}

/// Adjustment for one registry prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub prefix: String,

    /// Replacement prefix
    #[serde(default)]
    pub rename: Option<String>,

    /// Prepended to the identifier unless already present
    #[serde(default)]
    pub identifier_prefix: Option<String>,

    /// Replacement prefix keyed by the identifier's first character
    #[serde(default)]
    pub by_initial: BTreeMap<String, String>,
}

impl RemapRules {
    fn matches(&self, a: &str, b: &str) -> bool {
        if self.ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    fn registry(&self, prefix: &str) -> Option<&str> {
        if self.ignore_case {
            self.registries
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(prefix))
                .map(|(_, registry)| registry.as_str())
        } else {
            self.registries.get(prefix).map(String::as_str)
        }
    }

    /// Remap a single `prefix:identifier` value
    ///
    /// Returns the new prefix and identifier, and whether the resource name
    /// was missing from the registry mapping.
    pub fn remap(&self, value: Option<&str>) -> Remapped {
        let (mut prefix, mut identifier) = match value {
            Some(value) => match value.split_once(PREFIX_SEPARATOR) {
                Some((prefix, identifier)) => (Some(prefix.to_string()), Some(identifier.to_string())),
                None => (Some(value.to_string()), None),
            },
            None => (None, None),
        };

        let mut unmapped = None;

        if let (Some(current), Some(id)) = (prefix.as_mut(), identifier.as_mut()) {
            match self.registry(current) {
                Some(registry) => *current = registry.to_string(),
                None => unmapped = Some(current.clone()),
            }

            for rule in &self.rules {
                if !self.matches(&rule.prefix, current) {
                    continue;
                }

                if let Some(id_prefix) = &rule.identifier_prefix {
                    if !id.starts_with(id_prefix.as_str()) {
                        id.insert_str(0, id_prefix);
                    }
                }

                if let Some(rename) = &rule.rename {
                    *current = rename.clone();
                } else if let Some(initial) = id.chars().next() {
                    if let Some(split) = rule.by_initial.get(&initial.to_string()) {
                        *current = split.clone();
                    }
                }
            }
        }

        if identifier.is_none() {
            identifier = prefix.take();
            prefix = Some(self.namespace.clone());
        }

        Remapped {
            prefix,
            identifier,
            unmapped,
        }
    }
}

/// Result of remapping one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapped {
    pub prefix: Option<String>,
    pub identifier: Option<String>,
    /// Resource name that had no registry mapping
    pub unmapped: Option<String>,
}

/// Statistics of a table transformation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub rows: usize,
    /// Resource names missing from the registry mapping
    pub unmapped_prefixes: BTreeSet<String>,
}

/// Replace `source_column` by `prefix` and `identifier` columns
///
/// The remaining columns keep their order; the two new ones are appended.
pub fn transform_table(
    table: &Table,
    source_column: &str,
    rules: &RemapRules,
) -> Result<(Table, TransformSummary), TableError> {
    let source = table.column_index(source_column)?;

    let mut columns: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != source)
        .map(|(_, name)| name.clone())
        .collect();
    columns.push("prefix".to_string());
    columns.push("identifier".to_string());

    let mut output = Table::new(columns);
    let mut summary = TransformSummary::default();

    for row in &table.rows {
        let remapped = rules.remap(row.get(source).and_then(|value| value.as_deref()));

        if let Some(prefix) = remapped.unmapped {
            if summary.unmapped_prefixes.insert(prefix.clone()) {
                warn!(prefix = %prefix, namespace = %rules.namespace, "The resource prefix does not appear in the mapping");
            }
        }

        let mut out: Vec<Option<String>> = row
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != source)
            .map(|(_, value)| value.clone())
            .collect();
        out.push(remapped.prefix);
        out.push(remapped.identifier);
        output.push_row(out);
    }

    summary.rows = output.len();
    debug!(rows = summary.rows, unmapped = summary.unmapped_prefixes.len(), "Transformed table");
    Ok((output, summary))
}
