//! Header and label clean-up into the canonical schema.

use crate::period;
use crate::schema::{columns, entities};
use crate::table::{Cell, Table};
use once_cell::sync::Lazy;
use regex::Regex;

static MONTH_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Ecktermin .*:(\d{2}\.\d{4}),").expect("valid regex"));
static WEEK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Ecktermin .*:W(\d{2}) \d{4},Rest-Belastung Gesamt Personal").expect("valid regex")
});
static CUSTOMER_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Info1.*Mat\.Dat\.").expect("valid regex"));
static PERIOD_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}\.\d{4}|KW\d{2})$").expect("valid regex"));

/// Label for the first column of an extracted capacity table. `None` means
/// the table already carries its own labels.
pub fn entity_label(table_name: &str) -> Option<&'static str> {
    if table_name == "Personal_Factor" {
        None
    } else if table_name.starts_with("Working_or_not") {
        Some(columns::SMT_TYPE)
    } else {
        Some(columns::PB_TYPE)
    }
}

/// Canonical period name for an export or region header.
pub fn period_header(name: &str) -> String {
    if let Some(c) = MONTH_HEADER.captures(name) {
        return c[1].to_string();
    }
    if let Some(c) = WEEK_HEADER.captures(name) {
        return format!("KW{}", &c[1]);
    }
    let week = period::normalize_week_label(name);
    if week != name {
        return week;
    }
    period::month_label(name)
}

pub fn is_period_column(name: &str) -> bool {
    PERIOD_COLUMN.is_match(name)
}

pub fn is_placeholder(name: &str) -> bool {
    name.trim().is_empty() || name.starts_with("Unnamed")
}

/// Removes `+`, `-` and quote characters and trims.
pub fn clean_label(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '+' | '-' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Removes all whitespace, so `PB 1` and `PB1` compare equal.
pub fn entity_key(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalizes a table cut from the capacity workbook: semantic first column,
/// canonical period headers, placeholder columns dropped.
pub fn normalize_region(table_name: &str, mut table: Table) -> Table {
    if let Some(label) = entity_label(table_name) {
        table.set_column_name(0, label);
    }
    let first = table.columns().first().cloned();
    table.map_columns(|name| {
        if Some(name) == first.as_deref() {
            name.to_string()
        } else {
            period_header(name)
        }
    });
    table.drop_columns(is_placeholder);
    table
}

/// Renames PB export columns, drops placeholders and cleans the customer
/// labels. Rows are kept as they are.
pub fn rename_pb_export(mut table: Table) -> Table {
    if let Some(customer) = table
        .columns()
        .iter()
        .find(|c| CUSTOMER_HEADER.is_match(c))
        .cloned()
    {
        table.rename_column(&customer, columns::CUSTOMER_TYPE);
    }
    table.rename_column(columns::WORKPLACE, columns::SMT_TYPE);
    table.map_columns(period_header);
    table.drop_columns(is_placeholder);
    table.update_column(columns::CUSTOMER_TYPE, |cell| match cell {
        Cell::Text(s) => Cell::text(clean_label(s)),
        other => other.clone(),
    });
    table
}

/// Full PB export normalization: blank customers dropped, blank SMT types
/// filled with `Unknown`.
pub fn normalize_pb_export(table: Table) -> Table {
    let mut table = rename_pb_export(table);
    if let Some(idx) = table.column_index(columns::CUSTOMER_TYPE) {
        table.retain_rows(|row| !row[idx].is_empty());
    } else {
        log::warn!("PB export has no '{}' column", columns::CUSTOMER_TYPE);
    }
    table.update_column(columns::SMT_TYPE, |cell| {
        if cell.is_empty() {
            Cell::text(entities::UNKNOWN)
        } else {
            cell.clone()
        }
    });
    table
}

/// SMT export normalization. `None` when the workplace column is missing.
pub fn normalize_smt_export(mut table: Table) -> Option<Table> {
    if !table.rename_column(columns::WORKPLACE, columns::SMT_TYPE) {
        log::error!(
            "Column '{}' not found in SMT export, file skipped",
            columns::WORKPLACE
        );
        return None;
    }
    table.update_column(columns::SMT_TYPE, |cell| match cell {
        Cell::Text(s) => Cell::text(clean_label(s)),
        other => other.clone(),
    });
    let idx = table.column_index(columns::SMT_TYPE)?;
    table.retain_rows(|row| !row[idx].is_empty());
    table.map_columns(period_header);
    table.drop_columns(is_placeholder);
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_label() {
        assert_eq!(entity_label("Arbeitstage_Monthly"), Some("PB Type"));
        assert_eq!(entity_label("SMT_OEE"), Some("PB Type"));
        assert_eq!(entity_label("Working_or_not_Weekly"), Some("SMT Type"));
        assert_eq!(entity_label("Personal_Factor"), None);
    }

    #[test]
    fn test_period_header_patterns() {
        assert_eq!(
            period_header("Ecktermin 🔑:04.2024,Rest-Belastung Gesamt Personal"),
            "04.2024"
        );
        assert_eq!(
            period_header("Ecktermin ðŸ”‘:W07 2024,Rest-Belastung Gesamt Personal"),
            "KW07"
        );
        assert_eq!(period_header("wk.12.2024"), "KW12");
        assert_eq!(period_header("2024-05-01 00:00:00"), "05.2024");
        assert_eq!(period_header("Materialnummer"), "Materialnummer");
    }

    #[test]
    fn test_clean_label_and_entity_key() {
        assert_eq!(clean_label("\"+ Kunde-A\" "), "KundeA");
        assert_eq!(clean_label("  SMT 3 "), "SMT 3");
        assert_eq!(entity_key(" PB 1 "), "PB1");
    }

    #[test]
    fn test_is_period_column() {
        assert!(is_period_column("04.2024"));
        assert!(is_period_column("KW05"));
        assert!(!is_period_column("Info1 (Mat.Dat.)"));
        assert!(!is_period_column("KW5"));
    }

    // -------------------------------------------------------------------------
    // TABLE NORMALIZATION
    // -------------------------------------------------------------------------

    #[test]
    fn test_normalize_region() {
        let mut t = Table::new(["Unnamed: 0", "2024-04-01 00:00:00", "Unnamed: 2", "wk.05.2024"]);
        t.push_row(vec![Cell::text("PB1"), Cell::Number(1.0), Cell::Empty, Cell::Number(2.0)]);
        let t = normalize_region("Urlaubsquoten(Plan)_Monthly", t);
        assert_eq!(t.columns(), &["PB Type", "04.2024", "KW05"]);
        assert_eq!(t.rows()[0], vec![Cell::text("PB1"), Cell::Number(1.0), Cell::Number(2.0)]);
    }

    #[test]
    fn test_normalize_region_keeps_personal_factor_labels() {
        let t = Table::new(["Personal\nFactor", "SMT Type", "Result"]);
        let t = normalize_region("Personal_Factor", t);
        assert_eq!(t.columns(), &["Personal\nFactor", "SMT Type", "Result"]);
    }

    #[test]
    fn test_normalize_pb_export() {
        let mut t = Table::new([
            "Info1 (Mat.Dat.)",
            "Arbeitsplatznummer",
            "Unnamed: 2",
            "Ecktermin 🔑:04.2024,Rest-Belastung Gesamt Personal",
        ]);
        t.push_row(vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Number(100.0)]);
        t.push_row(vec![Cell::text("\"+Kunde A\""), Cell::Empty, Cell::Empty, Cell::Number(60.0)]);
        t.push_row(vec![Cell::text("-"), Cell::text("SMT1"), Cell::Empty, Cell::Number(40.0)]);

        let renamed = rename_pb_export(t.clone());
        assert_eq!(renamed.columns(), &["Coustmer Type", "SMT Type", "04.2024"]);
        assert_eq!(renamed.height(), 3);

        let full = normalize_pb_export(t);
        assert_eq!(full.height(), 1);
        assert_eq!(full.cell(0, "Coustmer Type"), Some(&Cell::text("Kunde A")));
        assert_eq!(full.cell(0, "SMT Type"), Some(&Cell::text("Unknown")));
    }

    #[test]
    fn test_normalize_smt_export() {
        let mut t = Table::new([
            "Arbeitsplatznummer",
            "Ecktermin 🔑:W05 2024,Rest-Belastung Gesamt Personal",
        ]);
        t.push_row(vec![Cell::text("\"SMT-1\""), Cell::Number(3.0)]);
        t.push_row(vec![Cell::text("+"), Cell::Number(9.0)]);
        let t = normalize_smt_export(t).unwrap();
        assert_eq!(t.columns(), &["SMT Type", "KW05"]);
        assert_eq!(t.height(), 1);
        assert_eq!(t.cell(0, "SMT Type"), Some(&Cell::text("SMT1")));

        assert!(normalize_smt_export(Table::new(["Other"])).is_none());
    }
}
