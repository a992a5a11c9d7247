//! Derived planning metrics computed from a master table's rows for today.
//!
//! Every calculator works on one (entity, period) pair at a time and returns
//! `None` when its inputs are missing or its denominator is not positive. A
//! `None` result is still written as a row with an empty value.

pub mod headcount;
pub mod maintenance;
pub mod personal_factor;
pub mod utilization;
pub mod variance;

use crate::record::{LongTable, Record};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Values the calculators need from outside the master table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalcInputs {
    /// OEE fraction applied to the flagship line.
    pub oee: f64,
    /// Weighted personal factor, `None` when the lookup region is missing.
    pub personal_factor: Option<f64>,
}

/// Distinct (entity, period) pairs among the rows dated `day`, in first-seen
/// order.
pub fn pairs_on(master: &LongTable, day: NaiveDate) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    master
        .on_day(day)
        .filter(|r| seen.insert((r.entity.as_str(), r.period.as_str())))
        .map(|r| (r.entity.clone(), r.period.clone()))
        .collect()
}

/// Rows for one pair on `day`.
pub fn pair_rows<'a>(
    master: &'a LongTable,
    entity: &'a str,
    period: &'a str,
    day: NaiveDate,
) -> impl Iterator<Item = &'a Record> {
    master
        .records
        .iter()
        .filter(move |r| r.matches(entity, period, day))
}

/// Sum of `attribute` values; missing values count as zero.
pub fn sum_of<'a>(rows: impl IntoIterator<Item = &'a Record>, attribute: &str) -> f64 {
    rows.into_iter()
        .filter(|r| r.attribute.trim() == attribute)
        .filter_map(|r| r.value)
        .sum()
}

/// Converts a calculator's per-pair results into rows stamped `date`.
pub(crate) fn derived_rows(
    attribute: &str,
    results: Vec<((String, String), Option<f64>)>,
    date: chrono::NaiveDateTime,
) -> (Vec<Record>, usize) {
    let nulls = results.iter().filter(|(_, v)| v.is_none()).count();
    let rows = results
        .into_iter()
        .map(|((entity, period), value)| Record::new(entity, period, attribute, value, date))
        .collect();
    (rows, nulls)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::record::{LongTable, Record};
    use chrono::NaiveDateTime;

    pub fn today() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-04-03 14:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    pub fn yesterday() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-04-02 14:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    /// A master table with `(entity, period, attribute, value)` rows dated today.
    pub fn master(rows: &[(&str, &str, &str, Option<f64>)]) -> LongTable {
        LongTable::with_records(
            "PB Type",
            rows.iter()
                .map(|(e, p, a, v)| Record::new(*e, *p, *a, *v, today()))
                .collect(),
        )
    }
}
