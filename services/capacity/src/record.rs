//! Long-format records: one value per (entity, period, attribute, date).

use crate::error::{PlanningError, Result};
use crate::schema::columns;
use crate::table::{Cell, Table};
use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity: String,
    pub period: String,
    pub attribute: String,
    pub value: Option<f64>,
    pub date: NaiveDateTime,
}

impl Record {
    pub fn new(
        entity: impl Into<String>,
        period: impl Into<String>,
        attribute: impl Into<String>,
        value: Option<f64>,
        date: NaiveDateTime,
    ) -> Self {
        Record {
            entity: entity.into(),
            period: period.into(),
            attribute: attribute.into(),
            value,
            date,
        }
    }

    pub fn is_on(&self, day: NaiveDate) -> bool {
        self.date.date() == day
    }

    pub fn matches(&self, entity: &str, period: &str, day: NaiveDate) -> bool {
        self.entity == entity && self.period == period && self.is_on(day)
    }
}

/// A master table in typed form. `entity_column` is the label written to
/// disk (`PB Type` or `SMT Type`).
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub entity_column: String,
    pub records: Vec<Record>,
}

impl LongTable {
    pub fn new(entity_column: &str) -> Self {
        LongTable {
            entity_column: entity_column.to_string(),
            records: Vec::new(),
        }
    }

    pub fn with_records(entity_column: &str, records: Vec<Record>) -> Self {
        LongTable {
            entity_column: entity_column.to_string(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records dated `day`, in table order.
    pub fn on_day(&self, day: NaiveDate) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(move |r| r.is_on(day))
    }

    /// Column order of the master workbooks.
    pub fn column_names(&self) -> [&str; 5] {
        [
            self.entity_column.as_str(),
            columns::PERIOD,
            columns::VALUE,
            columns::ATTRIBUTE,
            columns::DATE,
        ]
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(self.column_names());
        for r in &self.records {
            table.push_row(vec![
                Cell::text(r.entity.as_str()),
                Cell::text(r.period.as_str()),
                Cell::from_opt(r.value),
                Cell::text(r.attribute.as_str()),
                Cell::DateTime(r.date),
            ]);
        }
        table
    }

    /// Typed view of a stored table. Rows without a readable date cannot take
    /// part in same-day logic and are dropped with a warning.
    pub fn from_table(table: &Table, entity_column: &str) -> Result<Self> {
        if table.width() == 0 {
            return Ok(LongTable::new(entity_column));
        }
        let idx = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| PlanningError::MissingColumn(name.to_string()))
        };
        let entity = idx(entity_column)?;
        let period = idx(columns::PERIOD)?;
        let value = idx(columns::VALUE)?;
        let attribute = idx(columns::ATTRIBUTE)?;
        let date = idx(columns::DATE)?;

        let mut records = Vec::with_capacity(table.height());
        let mut dropped = 0;
        for row in table.rows() {
            let Some(dt) = row[date].as_datetime() else {
                dropped += 1;
                continue;
            };
            records.push(Record {
                entity: row[entity].to_string(),
                period: row[period].to_string(),
                attribute: row[attribute].to_string(),
                value: row[value].as_f64(),
                date: dt,
            });
        }
        if dropped > 0 {
            log::warn!("Dropped {} rows with unreadable '{}'", dropped, columns::DATE);
        }
        Ok(LongTable {
            entity_column: entity_column.to_string(),
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_table_round_trip_keeps_nulls() {
        let long = LongTable::with_records(
            "PB Type",
            vec![
                Record::new("PB1", "04.2024", "Arbeitstage", Some(20.0), dt("2024-04-03 14:00:00")),
                Record::new("PB2", "04.2024", "Utilization", None, dt("2024-04-03 14:00:00")),
            ],
        );
        let table = long.to_table();
        assert_eq!(table.columns(), &["PB Type", "Period", "Value", "Attribute", "Date"]);
        assert_eq!(table.cell(1, "Value"), Some(&Cell::Empty));

        let back = LongTable::from_table(&table, "PB Type").unwrap();
        assert_eq!(back, long);
    }

    #[test]
    fn test_from_table_drops_undated_rows() {
        let mut table = Table::new(["PB Type", "Period", "Value", "Attribute", "Date"]);
        table.push_row(vec![
            Cell::text("PB1"),
            Cell::text("04.2024"),
            Cell::text("n/a"),
            Cell::text("Arbeitstage"),
            Cell::text("2024-04-03 14:00:00"),
        ]);
        table.push_row(vec![
            Cell::text("PB1"),
            Cell::text("04.2024"),
            Cell::Number(1.0),
            Cell::text("Arbeitstage"),
            Cell::text("yesterday"),
        ]);
        let long = LongTable::from_table(&table, "PB Type").unwrap();
        assert_eq!(long.len(), 1);
        assert_eq!(long.records[0].value, None);
    }

    #[test]
    fn test_from_table_requires_columns() {
        let table = Table::new(["PB Type", "Period"]);
        assert!(matches!(
            LongTable::from_table(&table, "PB Type"),
            Err(PlanningError::MissingColumn(_))
        ));
        assert!(LongTable::from_table(&Table::default(), "PB Type").unwrap().is_empty());
    }

    #[test]
    fn test_on_day() {
        let long = LongTable::with_records(
            "PB Type",
            vec![
                Record::new("PB1", "04.2024", "Arbeitstage", Some(20.0), dt("2024-04-02 09:00:00")),
                Record::new("PB1", "04.2024", "Arbeitstage", Some(21.0), dt("2024-04-03 09:00:00")),
            ],
        );
        let day = NaiveDate::from_ymd_opt(2024, 4, 3).unwrap();
        let today: Vec<_> = long.on_day(day).collect();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].value, Some(21.0));
    }
}
