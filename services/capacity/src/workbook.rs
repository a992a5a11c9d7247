//! Spreadsheet and delimited-export I/O.
//!
//! Reading goes through calamine (any format it auto-detects), writing
//! through rust_xlsxwriter. Exports from the planning system are `;`
//! separated with a title line above the header.

use crate::error::{PlanningError, Result};
use crate::table::{parse_datetime, Cell, Table, DATETIME_DISPLAY};
use calamine::{open_workbook_auto, Data, Range, Reader};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_SHEET: &str = "Sheet1";

static TREE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*[-+]\s+").expect("valid regex"));

// =============================================================================
// READING
// =============================================================================

pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Column name for a header cell. Blank headers get a positional
/// placeholder so they can be recognised and dropped later.
pub fn header_name(cell: &Cell, position: usize) -> String {
    match cell {
        Cell::Empty => format!("Unnamed: {}", position),
        Cell::Text(s) if s.trim().is_empty() => format!("Unnamed: {}", position),
        Cell::Text(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Makes repeated header names unique by suffixing `.1`, `.2`, ...
pub(crate) fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|h| {
            let count = seen.entry(h.clone()).or_insert(0);
            let name = if *count == 0 {
                h.clone()
            } else {
                format!("{}.{}", h, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// One worksheet addressed in absolute sheet coordinates (row 0 is
/// spreadsheet row 1), regardless of where the used range starts.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    range: Range<Data>,
}

impl Sheet {
    pub fn cell(&self, row: u32, col: u32) -> Cell {
        self.range
            .get_value((row, col))
            .map(cell_from_data)
            .unwrap_or_default()
    }

    /// The used range as a table, its first row being the header.
    pub fn to_table(&self) -> Table {
        let mut rows = self.range.rows();
        let Some(header_row) = rows.next() else {
            return Table::default();
        };
        let headers: Vec<String> = header_row
            .iter()
            .enumerate()
            .map(|(i, d)| header_name(&cell_from_data(d), i))
            .collect();
        let mut table = Table::new(dedupe_headers(headers));
        for row in rows {
            let cells: Vec<Cell> = row.iter().map(cell_from_data).collect();
            if cells.iter().all(Cell::is_empty) {
                continue;
            }
            table.push_row(cells);
        }
        table
    }
}

/// Opens every requested sheet of a workbook in one pass. Sheets that cannot
/// be read come back as errors so callers can skip just those.
pub fn open_sheets(path: &Path, names: &[&str]) -> Result<HashMap<String, Result<Sheet>>> {
    let mut workbook = open_workbook_auto(path)?;
    let available = workbook.sheet_names();
    let mut sheets = HashMap::new();
    for name in names {
        if sheets.contains_key(*name) {
            continue;
        }
        let sheet = if available.iter().any(|n| n == name) {
            workbook
                .worksheet_range(name)
                .map(|range| Sheet {
                    name: name.to_string(),
                    range,
                })
                .map_err(PlanningError::from)
        } else {
            Err(PlanningError::SheetNotFound(name.to_string()))
        };
        sheets.insert(name.to_string(), sheet);
    }
    Ok(sheets)
}

/// Opens a single sheet, or the first sheet when `name` is `None`.
pub fn open_sheet(path: &Path, name: Option<&str>) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path)?;
    let available = workbook.sheet_names();
    let name = match name {
        Some(n) if available.iter().any(|a| a == n) => n.to_string(),
        Some(n) => return Err(PlanningError::SheetNotFound(n.to_string())),
        None => available
            .first()
            .cloned()
            .ok_or_else(|| PlanningError::SheetNotFound("<first sheet>".to_string()))?,
    };
    let range = workbook.worksheet_range(&name)?;
    Ok(Sheet { name, range })
}

/// Names of every sheet in a workbook, in workbook order.
pub fn sheet_names(path: &Path) -> Result<Vec<String>> {
    Ok(open_workbook_auto(path)?.sheet_names())
}

/// Reads the first sheet of a workbook as a header + rows table.
pub fn read_table(path: &Path) -> Result<Table> {
    Ok(open_sheet(path, None)?.to_table())
}

/// Like [`read_table`], but a missing file is an empty table.
pub fn read_table_or_empty(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Ok(Table::default());
    }
    read_table(path)
}

// =============================================================================
// WRITING
// =============================================================================

/// Writes `table` to `path` as a single-sheet workbook, replacing the file.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(DEFAULT_SHEET)?;
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, column_number(col)?, name, &header_format)?;
    }

    for (row_idx, row) in table.rows().iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1)
            .map_err(|_| PlanningError::InvalidColumns(format!("row {} out of range", row_idx)))?;
        for (col, cell) in row.iter().enumerate() {
            let col = column_number(col)?;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                Cell::Number(v) if v.is_finite() => {
                    worksheet.write_number(row_num, col, *v)?;
                }
                Cell::Number(_) => {}
                Cell::DateTime(dt) => {
                    let excel = ExcelDateTime::parse_from_str(&dt.format(DATETIME_DISPLAY).to_string())?;
                    worksheet.write_datetime_with_format(row_num, col, &excel, &date_format)?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn column_number(idx: usize) -> Result<u16> {
    u16::try_from(idx)
        .map_err(|_| PlanningError::InvalidColumns(format!("column {} out of range", idx)))
}

// =============================================================================
// DELIMITED EXPORTS
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Strip leading `- ` / `+ ` outline markers from every line.
    pub strip_tree_markers: bool,
}

/// Reads a `;` export file. Non-UTF-8 files are decoded as Windows-1252.
pub fn read_export(path: &Path, options: ExportOptions) -> Result<Table> {
    let bytes = std::fs::read(path)?;
    let content = match std::str::from_utf8(&bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };
    parse_export(&content, options)
}

/// Parses export content: title on the first line, header on the second.
pub fn parse_export(content: &str, options: ExportOptions) -> Result<Table> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let content = if options.strip_tree_markers {
        content
            .lines()
            .map(|line| TREE_MARKER.replace(line.trim(), "").into_owned())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        content.to_string()
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    // Title line
    if records.next().transpose()?.is_none() {
        return Ok(Table::default());
    }
    let Some(header) = records.next().transpose()? else {
        return Ok(Table::default());
    };
    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(&Cell::text(h), i))
        .collect();
    let mut table = Table::new(dedupe_headers(headers));

    for record in records {
        let record = record?;
        let cells: Vec<Cell> = record.iter().map(Cell::from_field).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }
    Ok(table)
}

// =============================================================================
// TESTS
// =============================================================================
