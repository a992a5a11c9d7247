//! Accumulating master workbooks.
//!
//! Appending is concatenate-then-dedupe with the last occurrence winning, and
//! every write replaces the whole file. One writer at a time.

use crate::error::Result;
use crate::record::{LongTable, Record};
use crate::table::{Cell, Table};
use crate::workbook;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendSummary {
    pub existing: usize,
    pub incoming: usize,
    pub total: usize,
}

impl AppendSummary {
    /// Rows that survived deduplication on top of the existing ones.
    pub fn added(&self) -> isize {
        self.total as isize - self.existing as isize
    }
}

impl std::fmt::Display for AppendSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} existing + {} incoming -> {} rows",
            self.existing, self.incoming, self.total
        )
    }
}

fn key_indices(table: &Table, keys: &[&str]) -> Vec<Option<usize>> {
    keys.iter().map(|k| table.column_index(k)).collect()
}

fn row_key(indices: &[Option<usize>], row: &[Cell]) -> Vec<String> {
    indices
        .iter()
        .map(|i| i.map(|i| row[i].key()).unwrap_or_default())
        .collect()
}

/// Drops rows that repeat an earlier key, keeping the last occurrence in its
/// original position. Columns absent from the table compare as empty.
pub fn dedupe_keep_last(table: &mut Table, keys: &[&str]) {
    if keys.is_empty() {
        return;
    }
    let indices = key_indices(table, keys);
    let key_of = |row: &[Cell]| row_key(&indices, row);

    let mut seen = HashSet::new();
    let keep: Vec<bool> = table
        .rows()
        .iter()
        .rev()
        .map(|row| seen.insert(key_of(row.as_slice())))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let mut i = 0;
    table.retain_rows(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}

/// `existing ++ incoming`, then deduplicated on `keys` keeping the last row.
/// Empty `keys` means plain concatenation.
pub fn append(existing: &Table, incoming: &Table, keys: &[&str]) -> Table {
    let mut merged = if existing.width() == 0 {
        incoming.clone()
    } else {
        existing.concat(incoming)
    };
    dedupe_keep_last(&mut merged, keys);
    merged
}

/// `existing` without the rows whose key occurs in `incoming`, followed by
/// every incoming row. Rows within one batch never collapse, and re-appending
/// the same batch replaces it.
pub fn replace_batch(existing: &Table, incoming: &Table, keys: &[&str]) -> Table {
    if existing.width() == 0 {
        return incoming.clone();
    }
    let mut kept = existing.clone();
    if !keys.is_empty() {
        let incoming_idx = key_indices(incoming, keys);
        let batch: HashSet<Vec<String>> = incoming
            .rows()
            .iter()
            .map(|row| row_key(&incoming_idx, row))
            .collect();
        let existing_idx = key_indices(&kept, keys);
        kept.retain_rows(|row| !batch.contains(&row_key(&existing_idx, row)));
    }
    kept.concat(incoming)
}

/// Typed variant of [`append`] for long-format master tables.
pub fn append_records(existing: &mut LongTable, incoming: Vec<Record>) {
    existing.records.extend(incoming);
    let mut seen = HashSet::new();
    let keep: Vec<bool> = existing
        .records
        .iter()
        .rev()
        .map(|r| {
            seen.insert((
                r.entity.clone(),
                r.period.clone(),
                r.attribute.clone(),
                r.date,
            ))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let mut i = 0;
    existing.records.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}

/// Removes rows of `attribute` dated `day`, so a same-day recomputation
/// replaces instead of accumulating. Returns the number removed.
pub fn remove_same_day(table: &mut LongTable, attribute: &str, day: NaiveDate) -> usize {
    let before = table.records.len();
    table
        .records
        .retain(|r| !(r.attribute.trim() == attribute && r.is_on(day)));
    before - table.records.len()
}

// =============================================================================
// FILES
// =============================================================================

/// Loads a master file; a missing file is an empty table.
pub fn load(path: &Path) -> Result<Table> {
    workbook::read_table_or_empty(path)
}

pub fn load_long(path: &Path, entity_column: &str) -> Result<LongTable> {
    LongTable::from_table(&load(path)?, entity_column)
}

pub fn save(path: &Path, table: &Table) -> Result<()> {
    workbook::write_table(path, table)
}

pub fn save_long(path: &Path, table: &LongTable) -> Result<()> {
    save(path, &table.to_table())
}

/// Read-modify-rewrite append of `incoming` into the file at `path`.
pub fn append_file(path: &Path, incoming: &Table, keys: &[&str]) -> Result<AppendSummary> {
    rewrite(path, incoming, |existing| append(existing, incoming, keys))
}

/// File variant of [`replace_batch`].
pub fn replace_file(path: &Path, incoming: &Table, keys: &[&str]) -> Result<AppendSummary> {
    rewrite(path, incoming, |existing| replace_batch(existing, incoming, keys))
}

fn rewrite(path: &Path, incoming: &Table, merge: impl FnOnce(&Table) -> Table) -> Result<AppendSummary> {
    let existing = load(path)?;
    let merged = merge(&existing);
    save(path, &merged)?;
    let summary = AppendSummary {
        existing: existing.height(),
        incoming: incoming.height(),
        total: merged.height(),
    };
    log::info!("Appended to {}: {}", path.display(), summary);
    Ok(summary)
}
