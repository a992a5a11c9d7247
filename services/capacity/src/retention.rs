//! Retention sweep: drops rows older than the retention window.

use crate::error::{PlanningError, Result};
use crate::report::StepOutcome;
use crate::table::{Cell, Table};
use crate::workbook;
use chrono::{Duration, NaiveDateTime};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Oldest timestamp still kept: `now − months × 30 days`.
pub fn cutoff(now: NaiveDateTime, months: u32) -> NaiveDateTime {
    now - Duration::days(i64::from(months) * 30)
}

/// Keeps rows whose `date_column` is on or after the cutoff. Returns the
/// filtered table and the number of rows removed.
///
/// Empty date cells are kept. Any other unreadable date fails the sweep.
pub fn sweep(table: &Table, date_column: &str, months: u32, now: NaiveDateTime) -> Result<(Table, usize)> {
    let idx = table
        .column_index(date_column)
        .ok_or_else(|| PlanningError::MissingColumn(date_column.to_string()))?;
    let limit = cutoff(now, months);

    let mut kept = Table::new(table.columns().iter().map(String::as_str));
    for (i, row) in table.rows().iter().enumerate() {
        let keep = match &row[idx] {
            Cell::Empty => true,
            cell => match cell.as_datetime() {
                Some(dt) => dt >= limit,
                None => {
                    return Err(PlanningError::InvalidDate {
                        column: date_column.to_string(),
                        row: i + 2,
                        value: cell.to_string(),
                    })
                }
            },
        };
        if keep {
            kept.push_row(row.clone());
        }
    }
    let removed = table.height() - kept.height();
    Ok((kept, removed))
}

/// Sweeps one workbook in place. A file without the date column is skipped,
/// as is a workbook with more than one sheet, since the rewrite keeps only
/// the first.
pub fn sweep_file(
    path: &Path,
    date_column: &str,
    months: u32,
    now: NaiveDateTime,
    dry_run: bool,
) -> Result<StepOutcome> {
    let sheets = workbook::sheet_names(path)?;
    if sheets.len() > 1 {
        log::warn!("{} has {} sheets, retention skipped", path.display(), sheets.len());
        return Ok(StepOutcome::skipped(format!("{} sheets", sheets.len())));
    }
    let table = workbook::read_table(path)?;
    if !table.has_column(date_column) {
        return Ok(StepOutcome::skipped(format!("no '{}' column", date_column)));
    }
    let (kept, removed) = sweep(&table, date_column, months, now)?;
    if removed > 0 && !dry_run {
        workbook::write_table(path, &kept)?;
    }
    Ok(StepOutcome::ok(format!(
        "removed {} of {} rows older than {}",
        removed,
        table.height(),
        cutoff(now, months).date()
    )))
}

/// Every `.xlsx` file below `dir`, sorted.
pub fn workbooks_under(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let path = entry.path();
        let is_xlsx = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("xlsx"))
            .unwrap_or(false);
        let is_lock = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("~$"))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_xlsx && !is_lock {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Sweeps every workbook under `dir`. Each file gets its own outcome, so one
/// bad file does not stop the rest.
pub fn sweep_dir(
    dir: &Path,
    date_column: &str,
    months: u32,
    now: NaiveDateTime,
    dry_run: bool,
) -> Result<Vec<(PathBuf, StepOutcome)>> {
    let files = workbooks_under(dir)?;
    log::info!("Retention sweep over {} workbooks in {}", files.len(), dir.display());
    Ok(files
        .into_iter()
        .map(|path| {
            let outcome: StepOutcome = sweep_file(&path, date_column, months, now, dry_run).into();
            (path, outcome)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-04-03 14:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn dated(ages_in_days: &[i64]) -> Table {
        let mut t = Table::new(["PB Type", "Value", "Date"]);
        for (i, age) in ages_in_days.iter().enumerate() {
            t.push_row(vec![
                Cell::text(format!("PB{}", i + 1)),
                Cell::Number(*age as f64),
                Cell::DateTime(now() - Duration::days(*age)),
            ]);
        }
        t
    }

    #[test]
    fn test_eight_month_window() {
        let (kept, removed) = sweep(&dated(&[300, 200, 0]), "Date", 8, now()).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(kept.height(), 2);
        assert_eq!(kept.cell(0, "Value"), Some(&Cell::Number(200.0)));
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let (kept, _) = sweep(&dated(&[240]), "Date", 8, now()).unwrap();
        assert_eq!(kept.height(), 1);
    }

    #[test]
    fn test_unparseable_date_fails() {
        let mut t = dated(&[1]);
        t.push_row(vec![Cell::text("PB9"), Cell::Number(0.0), Cell::text("soon")]);
        let err = sweep(&t, "Date", 8, now()).unwrap_err();
        assert!(matches!(err, PlanningError::InvalidDate { row: 3, .. }));
    }

    #[test]
    fn test_sweep_dir_per_file_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("archive");
        workbook::write_table(&dir.path().join("a.xlsx"), &dated(&[300, 10])).unwrap();
        workbook::write_table(&nested.join("b.xlsx"), &dated(&[5])).unwrap();
        workbook::write_table(&dir.path().join("c.xlsx"), &Table::new(["Other"])).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let outcomes = sweep_dir(dir.path(), "Date", 8, now(), false).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0].1, StepOutcome::Ok { .. }));
        assert!(matches!(outcomes[2].1, StepOutcome::Skipped { .. }));

        let a = workbook::read_table(&dir.path().join("a.xlsx")).unwrap();
        assert_eq!(a.height(), 1);
    }

    #[test]
    fn test_multi_sheet_workbook_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        let mut wb = rust_xlsxwriter::Workbook::new();
        let first = wb.add_worksheet();
        first.write_string(0, 0, "Date").unwrap();
        first.write_string(1, 0, "2020-01-01 00:00:00").unwrap();
        let second = wb.add_worksheet();
        second.set_name("Notes").unwrap();
        second.write_string(0, 0, "keep me").unwrap();
        wb.save(&path).unwrap();

        let outcome = sweep_file(&path, "Date", 8, now(), false).unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped { .. }));
        assert_eq!(workbook::sheet_names(&path).unwrap(), vec!["Sheet1", "Notes"]);
        assert_eq!(workbook::read_table(&path).unwrap().height(), 1);
    }

    #[test]
    fn test_dry_run_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.xlsx");
        workbook::write_table(&path, &dated(&[300, 10])).unwrap();
        sweep_file(&path, "Date", 8, now(), true).unwrap();
        assert_eq!(workbook::read_table(&path).unwrap().height(), 2);
    }
}
