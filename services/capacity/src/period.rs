//! Period strings: calendar months (`MM.YYYY`) and ISO weeks (`KWxx`).
//!
//! Month and week labels are cross-referenced through the first day of the
//! period: a week belongs to the month of its Monday, a month to the ISO week
//! of its 1st. Weeks straddling a month boundary are therefore attributed to
//! the earlier month.

use crate::schema::columns;
use crate::table::{Cell, Table};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

static WEEK_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^wk\.(\d{2})\.\d{4}$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Month { month: u32, year: i32 },
    Week(u32),
}

impl Period {
    pub fn parse(s: &str) -> Option<Period> {
        let s = s.trim();
        if let Some(rest) = s.get(2..).filter(|_| s[..2].eq_ignore_ascii_case("kw")) {
            let n: u32 = rest.trim().parse().ok()?;
            return (1..=53).contains(&n).then_some(Period::Week(n));
        }
        let (m, y) = s.split_once('.')?;
        if m.len() != 2 || y.len() != 4 {
            return None;
        }
        let month: u32 = m.parse().ok()?;
        let year: i32 = y.parse().ok()?;
        (1..=12)
            .contains(&month)
            .then_some(Period::Month { month, year })
    }

    /// First calendar day of the period. Weeks resolve against
    /// `reference_year`.
    pub fn first_day(&self, reference_year: i32) -> Option<NaiveDate> {
        match *self {
            Period::Month { month, year } => NaiveDate::from_ymd_opt(year, month, 1),
            Period::Week(week) => NaiveDate::from_isoywd_opt(reference_year, week, Weekday::Mon),
        }
    }

    pub fn month(&self, year: i32) -> Option<u32> {
        match *self {
            Period::Month { month, .. } => Some(month),
            Period::Week(_) => self.first_day(year).map(|d| d.month()),
        }
    }

    pub fn week(&self) -> Option<u32> {
        match *self {
            Period::Week(week) => Some(week),
            Period::Month { .. } => self.first_day(0).map(|d| d.iso_week().week()),
        }
    }

    pub fn quarter(&self, year: i32) -> Option<u32> {
        self.month(year).map(|m| (m - 1) / 3 + 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month { month, year } => write!(f, "{:02}.{}", month, year),
            Period::Week(week) => write!(f, "KW{:02}", week),
        }
    }
}

/// Quarter of a period. `KWxx` resolves through the Monday of that week in
/// `year`.
pub fn quarter_of(period: &str, year: i32) -> Option<u32> {
    Period::parse(period)?.quarter(year)
}

/// ISO week of the first day of a `MM.YYYY` month.
pub fn week_of(month_period: &str) -> Option<u32> {
    match Period::parse(month_period)? {
        p @ Period::Month { .. } => p.week(),
        Period::Week(_) => None,
    }
}

/// Month of the Monday of a `KWxx` week in `year`.
pub fn month_of(week_period: &str, year: i32) -> Option<u32> {
    match Period::parse(week_period)? {
        p @ Period::Week(_) => p.month(year),
        Period::Month { .. } => None,
    }
}

/// `wk.05.2024` → `KW05`. Other labels are returned unchanged.
pub fn normalize_week_label(label: &str) -> String {
    WEEK_LABEL
        .captures(label.trim())
        .map(|c| format!("KW{}", &c[1]))
        .unwrap_or_else(|| label.to_string())
}

/// Renders a date-like header as `MM.YYYY`; anything else is kept as is.
pub fn month_label(header: &str) -> String {
    let trimmed = header.trim();
    if Period::parse(trimmed).is_some() {
        return trimmed.to_string();
    }
    match crate::table::parse_datetime(trimmed) {
        Some(dt) => month_label_of(dt),
        None => header.to_string(),
    }
}

pub fn month_label_of(dt: NaiveDateTime) -> String {
    dt.format("%m.%Y").to_string()
}

/// Appends `Month` (`MM`), `Week` (`WW`) and `Quarter` derived from
/// `period_column`. Unparseable periods leave the three cells empty.
pub fn add_period_columns(table: &mut Table, period_column: &str, year: i32) {
    let Some(idx) = table.column_index(period_column) else {
        log::warn!("Column '{}' missing, period labels not added", period_column);
        return;
    };
    let parsed = |row: &[Cell]| Period::parse(&row[idx].to_string());
    table.derive_column(columns::MONTH, |row| {
        parsed(row)
            .and_then(|p| p.month(year))
            .map(|m| Cell::text(format!("{:02}", m)))
            .unwrap_or_default()
    });
    table.derive_column(columns::WEEK, |row| {
        parsed(row)
            .and_then(|p| p.week())
            .map(|w| Cell::text(format!("{:02}", w)))
            .unwrap_or_default()
    });
    table.derive_column(columns::QUARTER, |row| {
        Cell::from_opt(parsed(row).and_then(|p| p.quarter(year)).map(f64::from))
    });
}

/// Relabels `Month` and `Quarter` of weekly rows from a monthly table: a
/// `KWxx` row takes the labels of the `MM.YYYY` row holding its Monday in
/// `year`. Weeks whose month the monthly table lacks keep their own labels.
/// Returns the number of rows relabelled.
pub fn map_week_to_month_and_quarter(weekly: &mut Table, monthly: &Table, year: i32) -> usize {
    let (Some(mp), Some(mm), Some(mq)) = (
        monthly.column_index(columns::PERIOD),
        monthly.column_index(columns::MONTH),
        monthly.column_index(columns::QUARTER),
    ) else {
        log::error!(
            "Monthly table needs '{}', '{}' and '{}' columns",
            columns::PERIOD,
            columns::MONTH,
            columns::QUARTER
        );
        return 0;
    };
    let Some(wp) = weekly.column_index(columns::PERIOD) else {
        return 0;
    };

    let mut labels: HashMap<String, (Cell, Cell)> = HashMap::new();
    for row in monthly.rows() {
        labels
            .entry(row[mp].key())
            .or_insert_with(|| (row[mm].clone(), row[mq].clone()));
    }
    let targets: Vec<Option<(Cell, Cell)>> = weekly
        .rows()
        .iter()
        .map(|row| match Period::parse(&row[wp].to_string()) {
            Some(p @ Period::Week(_)) => p
                .first_day(year)
                .and_then(|monday| labels.get(&monday.format("%m.%Y").to_string()))
                .cloned(),
            _ => None,
        })
        .collect();

    for (column, take_quarter) in [(columns::MONTH, false), (columns::QUARTER, true)] {
        let current = weekly.column_index(column);
        let mut i = 0;
        weekly.derive_column(column, |row| {
            let value = match &targets[i] {
                Some((_, quarter)) if take_quarter => quarter.clone(),
                Some((month, _)) => month.clone(),
                None => current.map(|c| row[c].clone()).unwrap_or_default(),
            };
            i += 1;
            value
        });
    }
    targets.iter().filter(|t| t.is_some()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // PARSING
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            Period::parse("04.2024"),
            Some(Period::Month { month: 4, year: 2024 })
        );
        assert_eq!(Period::parse("KW05"), Some(Period::Week(5)));
        assert_eq!(Period::parse("kw05"), Some(Period::Week(5)));
        assert_eq!(Period::parse("13.2024"), None);
        assert_eq!(Period::parse("KW54"), None);
        assert_eq!(Period::parse("April"), None);
        assert_eq!(Period::parse("4.2024"), None);
    }

    #[test]
    fn test_display_round_trips_canonical_form() {
        assert_eq!(Period::Month { month: 4, year: 2024 }.to_string(), "04.2024");
        assert_eq!(Period::Week(5).to_string(), "KW05");
    }

    // -------------------------------------------------------------------------
    // HARMONIZATION
    // -------------------------------------------------------------------------

    #[test]
    fn test_quarter_of() {
        assert_eq!(quarter_of("04.2024", 2024), Some(2));
        assert_eq!(quarter_of("12.2023", 2024), Some(4));
        assert_eq!(quarter_of("KW05", 2024), Some(1));
        assert_eq!(quarter_of("KW27", 2024), Some(3));
        assert_eq!(quarter_of("garbage", 2024), None);
    }

    #[test]
    fn test_week_of_month() {
        // 2024-04-01 is a Monday in ISO week 14
        assert_eq!(week_of("04.2024"), Some(14));
        // 2021-01-01 belongs to ISO week 53 of 2020
        assert_eq!(week_of("01.2021"), Some(53));
        assert_eq!(week_of("KW05"), None);
    }

    #[test]
    fn test_month_of_week_uses_monday() {
        // Monday of 2024-W05 is 2024-01-29
        assert_eq!(month_of("KW05", 2024), Some(1));
        // Monday of 2024-W09 is 2024-02-26, week ends in March
        assert_eq!(month_of("KW09", 2024), Some(2));
        // 2023 has no week 53
        assert_eq!(month_of("KW53", 2023), None);
        assert_eq!(month_of("04.2024", 2024), None);
    }

    #[test]
    fn test_header_labels() {
        assert_eq!(normalize_week_label("wk.07.2024"), "KW07");
        assert_eq!(normalize_week_label("KW07"), "KW07");
        assert_eq!(month_label("01.04.2024"), "04.2024");
        assert_eq!(month_label("2024-04-01 00:00:00"), "04.2024");
        assert_eq!(month_label("04.2024"), "04.2024");
        assert_eq!(month_label("KW07"), "KW07");
    }

    #[test]
    fn test_add_period_columns() {
        let mut t = Table::new(["Period"]);
        t.push_row(vec![Cell::text("04.2024")]);
        t.push_row(vec![Cell::text("KW05")]);
        t.push_row(vec![Cell::text("Total")]);
        add_period_columns(&mut t, "Period", 2024);

        assert_eq!(t.cell(0, "Month"), Some(&Cell::text("04")));
        assert_eq!(t.cell(0, "Week"), Some(&Cell::text("14")));
        assert_eq!(t.cell(0, "Quarter"), Some(&Cell::Number(2.0)));
        assert_eq!(t.cell(1, "Month"), Some(&Cell::text("01")));
        assert_eq!(t.cell(1, "Week"), Some(&Cell::text("05")));
        assert_eq!(t.cell(1, "Quarter"), Some(&Cell::Number(1.0)));
        assert_eq!(t.cell(2, "Quarter"), Some(&Cell::Empty));
    }

    #[test]
    fn test_map_week_to_month_and_quarter() {
        let mut monthly = Table::new(["Period"]);
        monthly.push_row(vec![Cell::text("01.2024")]);
        monthly.push_row(vec![Cell::text("04.2024")]);
        monthly.push_row(vec![Cell::text("04.2024")]);
        add_period_columns(&mut monthly, "Period", 2024);

        let mut weekly = Table::new(["Period", "Value"]);
        for week in ["KW05", "KW14", "KW40"] {
            weekly.push_row(vec![Cell::text(week), Cell::Number(1.0)]);
        }
        assert_eq!(map_week_to_month_and_quarter(&mut weekly, &monthly, 2024), 2);
        assert_eq!(weekly.columns(), &["Period", "Value", "Month", "Quarter"]);
        assert_eq!(weekly.cell(0, "Month"), Some(&Cell::text("01")));
        // Monday of 2024-W14 is 2024-04-01
        assert_eq!(weekly.cell(1, "Month"), Some(&Cell::text("04")));
        assert_eq!(weekly.cell(1, "Quarter"), Some(&Cell::Number(2.0)));
        // KW40 starts on 2024-09-30; September is not in the monthly table
        assert_eq!(weekly.cell(2, "Month"), Some(&Cell::Empty));

        let mut labelled = weekly.clone();
        add_period_columns(&mut labelled, "Period", 2024);
        assert_eq!(map_week_to_month_and_quarter(&mut labelled, &Table::new(["Period"]), 2024), 0);
        assert_eq!(labelled.cell(2, "Month"), Some(&Cell::text("09")));
    }
}
