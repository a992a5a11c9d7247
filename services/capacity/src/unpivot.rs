//! Wide (one column per period) to long (one row per period) reshaping.

use crate::error::{PlanningError, Result};
use crate::normalize;
use crate::record::{LongTable, Record};
use crate::schema::columns;
use crate::table::{Cell, Table};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Melts `value_columns` into `(period, value)` pairs next to the `id_columns`.
///
/// Output columns: the id columns, then `Period` and `Value`. Rows come out
/// column-major: every row of the first value column, then the next.
pub fn melt(table: &Table, id_columns: &[&str], value_columns: &[String]) -> Result<Table> {
    let ids = id_columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| PlanningError::MissingColumn(c.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    let values = value_columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| PlanningError::MissingColumn(c.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut header: Vec<&str> = id_columns.to_vec();
    header.push(columns::PERIOD);
    header.push(columns::VALUE);
    let mut out = Table::new(header);

    for (name, &v) in value_columns.iter().zip(&values) {
        for row in table.rows() {
            let mut cells: Vec<Cell> = ids.iter().map(|&i| row[i].clone()).collect();
            cells.push(Cell::text(name.as_str()));
            cells.push(row[v].clone());
            out.push_row(cells);
        }
    }
    Ok(out)
}

/// Columns of `table` named like a canonical period (`MM.YYYY`, `KWxx`).
pub fn period_columns(table: &Table) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| normalize::is_period_column(c))
        .cloned()
        .collect()
}

/// Attribute name of a capacity table: the part before the first `_`.
pub fn attribute_for(table_name: &str) -> &str {
    table_name.split('_').next().unwrap_or(table_name)
}

/// Entity column used as identifier when unpivoting a capacity table.
pub fn id_column_for(table_name: &str) -> &'static str {
    if table_name == "Personal_Factor" || table_name.starts_with("Working_or_not") {
        columns::SMT_TYPE
    } else {
        columns::PB_TYPE
    }
}

/// Whether a capacity table holds period data worth unpivoting.
pub fn is_unpivotable(table_name: &str) -> bool {
    table_name.contains("Monthly") || table_name.contains("Weekly") || table_name == "SMT_OEE"
}

/// Unpivots one normalized capacity table into long records stamped with
/// `timestamp`. Every column except the identifier is a period.
pub fn unpivot(
    table: &Table,
    id_column: &str,
    attribute: &str,
    timestamp: NaiveDateTime,
) -> Result<LongTable> {
    let value_columns: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.as_str() != id_column)
        .cloned()
        .collect();
    let melted = melt(table, &[id_column], &value_columns)?;

    let records = melted
        .rows()
        .iter()
        .map(|row| Record {
            entity: row[0].to_string().trim().to_string(),
            period: row[1].to_string(),
            attribute: attribute.to_string(),
            value: row[2].as_f64(),
            date: timestamp,
        })
        .collect();
    Ok(LongTable::with_records(id_column, records))
}

/// Unpivots every eligible extracted table. Tables missing their identifier
/// column are logged and skipped; the rest still go through.
pub fn unpivot_all(
    tables: &BTreeMap<String, Table>,
    timestamp: NaiveDateTime,
) -> BTreeMap<String, LongTable> {
    let mut out = BTreeMap::new();
    for (name, table) in tables {
        if !is_unpivotable(name) {
            log::warn!("Skipping unpivot for '{}': not a period table", name);
            continue;
        }
        let id_column = id_column_for(name);
        match unpivot(table, id_column, attribute_for(name), timestamp) {
            Ok(long) => {
                log::info!("Unpivoted '{}': {} rows", name, long.len());
                out.insert(name.clone(), long);
            }
            Err(e) => log::error!("Unpivot failed for '{}': {}", name, e),
        }
    }
    out
}
