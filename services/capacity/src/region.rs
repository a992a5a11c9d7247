//! Fixed-position region extraction from the capacity planning workbook.
//!
//! Regions are data, not code: each one names a window of absolute sheet
//! rows and a column selection. Offsets are trusted as given; a workbook
//! whose layout moved yields wrong tables, not errors.

use crate::error::{PlanningError, Result};
use crate::table::{Cell, Table};
use crate::workbook::{self, dedupe_headers, header_name, Sheet};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    /// Falls back to the workbook's configured sheet.
    #[serde(default)]
    pub sheet: Option<String>,
    /// 0-based sheet row where the region starts.
    pub skip: u32,
    /// Number of data rows.
    pub count: u32,
    /// Column letters, e.g. `A:N`, `T`, `A,H:S`.
    pub columns: String,
    /// Absolute row holding the header. When unset, the row at `skip` is the
    /// header and data follows it.
    #[serde(default)]
    pub header_row: Option<u32>,
}

/// (name, skip, count, columns, header_row)
const DEFAULT_REGIONS: &[(&str, u32, u32, &str, Option<u32>)] = &[
    ("SMT_OEE", 13, 2, "T", None),
    ("SMT_OEE_Total_Monthly", 8, 1, "A:N", Some(2)),
    ("SMT_OEE_Total_Weekly", 8, 1, "A:N", Some(10)),
    ("Personal_Factor", 2, 5, "P:R", None),
    ("Urlaubsquoten(Plan)_Weekly", 10, 5, "A:N", None),
    ("Urlaubsquoten(Plan)_Monthly", 16, 5, "A:N", None),
    ("Krankheitsquoten(Plan)_Monthly", 22, 5, "A:N", None),
    ("Mitarbeiter(IST)_Monthly", 28, 5, "A:N", None),
    ("Mitarbeiter(IST)_Weekly", 85, 5, "A:N", None),
    ("Gleitzeit(Plan)_Monthly", 34, 5, "A:N", None),
    ("Verteilzeit(Plan)_Monthly", 40, 5, "A:N", None),
    ("Kurzarbeitstage(Plan)_Monthly", 53, 5, "A:N", None),
    ("Kurzarbeitstage(Plan)_Weekly", 46, 5, "A:N", None),
    ("Working_or_not_Monthly", 59, 6, "A,H:S", None),
    ("Working_or_not_Weekly", 59, 6, "A:G", None),
    ("Arbeitstage_Monthly", 73, 5, "A:N", None),
    ("Arbeitstage_Weekly", 79, 5, "A:N", None),
    ("Krankheitsquoten(Plan)_Weekly", 23, 4, "A:N", Some(10)),
    ("Gleitzeit(Plan)_Weekly", 35, 4, "A:N", Some(10)),
    ("Verteilzeit(Plan)_Weekly", 41, 4, "A:N", Some(10)),
];

pub fn default_regions() -> Vec<RegionSpec> {
    DEFAULT_REGIONS
        .iter()
        .map(|&(name, skip, count, columns, header_row)| RegionSpec {
            name: name.to_string(),
            sheet: None,
            skip,
            count,
            columns: columns.to_string(),
            header_row,
        })
        .collect()
}

/// Result of extracting a set of regions. Tables are keyed by region name.
#[derive(Debug, Default)]
pub struct Extraction {
    pub tables: BTreeMap<String, Table>,
    /// Regions that could not be read, with the reason.
    pub failures: Vec<(String, String)>,
}

/// Column letters to 0-based indices: `A` → 0, `Z` → 25, `AA` → 26.
pub fn column_index(letters: &str) -> Option<u32> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .chars()
        .try_fold(0u32, |acc, c| {
            let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
            acc.checked_mul(26)?.checked_add(digit)
        })
        .map(|n| n - 1)
}

/// Parses a column selection such as `A,H:S` into indices, in order.
pub fn parse_columns(selection: &str) -> Result<Vec<u32>> {
    let invalid = || PlanningError::InvalidColumns(selection.to_string());
    let mut out = Vec::new();
    for part in selection.split(',') {
        match part.split_once(':') {
            Some((from, to)) => {
                let from = column_index(from).ok_or_else(invalid)?;
                let to = column_index(to).ok_or_else(invalid)?;
                if to < from {
                    return Err(invalid());
                }
                out.extend(from..=to);
            }
            None => out.push(column_index(part).ok_or_else(invalid)?),
        }
    }
    Ok(out)
}

/// Cuts one region out of a sheet.
pub fn extract_region(sheet: &Sheet, spec: &RegionSpec) -> Result<Table> {
    let columns = parse_columns(&spec.columns)?;
    let (header_row, data_start) = match spec.header_row {
        Some(row) => (row, spec.skip),
        None => (spec.skip, spec.skip + 1),
    };

    let headers: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, &c)| header_name(&sheet.cell(header_row, c), i))
        .collect();
    let mut table = Table::new(dedupe_headers(headers));

    for row in data_start..data_start + spec.count {
        let cells: Vec<Cell> = columns.iter().map(|&c| sheet.cell(row, c)).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

/// Extracts every region from the workbook at `path`.
///
/// A missing or unreadable workbook is an error; a region whose sheet or
/// column selection is bad is recorded in `failures` and skipped.
pub fn extract(path: &Path, default_sheet: &str, regions: &[RegionSpec]) -> Result<Extraction> {
    let sheet_names: Vec<&str> = regions
        .iter()
        .map(|r| r.sheet.as_deref().unwrap_or(default_sheet))
        .collect();
    let sheets = workbook::open_sheets(path, &sheet_names)?;

    let mut extraction = Extraction::default();
    for (spec, sheet_name) in regions.iter().zip(sheet_names) {
        let table = match sheets.get(sheet_name) {
            Some(Ok(sheet)) => extract_region(sheet, spec),
            Some(Err(e)) => Err(PlanningError::SheetNotFound(format!("{} ({})", sheet_name, e))),
            None => Err(PlanningError::SheetNotFound(sheet_name.to_string())),
        };
        match table {
            Ok(table) => {
                log::debug!(
                    "Extracted '{}': {} rows x {} columns",
                    spec.name,
                    table.height(),
                    table.width()
                );
                extraction.tables.insert(spec.name.clone(), table);
            }
            Err(e) => {
                log::error!("Region '{}' skipped: {}", spec.name, e);
                extraction.failures.push((spec.name.clone(), e.to_string()));
            }
        }
    }
    Ok(extraction)
}
