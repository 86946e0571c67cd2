//! Column statistics for extracted tables

use crate::error::TableError;
use crate::table::Table;
use std::collections::HashMap;

/// Number of non-empty cells in a column and their share of all rows
///
/// Formatted as `"12,345 (98.76%)"`. An empty table has no share and is an
/// error.
pub fn value_count(table: &Table, column: &str, digits: usize) -> Result<String, TableError> {
    let count = table.column(column)?.filter(Option::is_some).count();
    if table.is_empty() {
        return Err(TableError::Empty);
    }

    let share = count as f64 / table.len() as f64 * 100.0;
    Ok(format!("{} ({:.*}%)", intcomma(count), digits, share))
}

/// Occurrences of every non-empty value, in order of first appearance
pub fn duplicates(table: &Table, column: &str) -> Result<Vec<(String, usize)>, TableError> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for value in table.column(column)?.flatten() {
        match positions.get(value) {
            Some(&index) => order[index].1 += 1,
            None => {
                positions.insert(value, order.len());
                order.push((value.to_string(), 1));
            },
        }
    }

    Ok(order)
}

/// Group digits by thousands with commas
pub fn intcomma(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
