//! Line utilization in percent.
//!
//! The flagship line is measured against shift capacity scaled by the
//! personal factor; the other lines compare requirement to actual headcount.

use super::{derived_rows, pair_rows, pairs_on, CalcInputs};
use crate::context::RunContext;
use crate::master;
use crate::normalize::entity_key;
use crate::record::{LongTable, Record};
use crate::report::StepOutcome;
use crate::schema::{attributes, entities, HOURS_PER_DAY, SHIFTS};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Last value per attribute for the pair; missing values count as zero.
fn last_values<'a>(rows: impl Iterator<Item = &'a Record>) -> HashMap<&'a str, f64> {
    let mut out = HashMap::new();
    for r in rows {
        out.insert(r.attribute.trim(), r.value.unwrap_or(0.0));
    }
    out
}

pub fn utilization(
    master: &LongTable,
    entity: &str,
    period: &str,
    day: NaiveDate,
    personal_factor: Option<f64>,
) -> Option<f64> {
    let values = last_values(pair_rows(master, entity, period, day));
    let get = |a: &str| values.get(a).copied().unwrap_or(0.0);

    if entity_key(entity) == entities::FLAGSHIP {
        let production_hours = get(attributes::PRODUCTION_HOURS);
        let working_days = get(attributes::WORKING_DAYS);
        let factor = personal_factor.unwrap_or(0.0);
        if production_hours <= 0.0 || working_days <= 0.0 || factor <= 0.0 {
            log::debug!("Insufficient inputs for {} utilization in {}", entity, period);
            return None;
        }
        Some(production_hours * 100.0 / (factor * working_days * SHIFTS * HOURS_PER_DAY))
    } else {
        let actual = get(attributes::ACTUAL_HEADCOUNT);
        if actual <= 0.0 {
            return None;
        }
        Some(get(attributes::HEADCOUNT_REQUIREMENT) / actual * 100.0)
    }
}

pub fn apply(master: &mut LongTable, ctx: &RunContext, inputs: &CalcInputs) -> StepOutcome {
    let today = ctx.today();
    let removed = master::remove_same_day(master, attributes::UTILIZATION, today);
    if removed > 0 {
        log::info!("Removed {} existing utilization rows for {}", removed, today);
    }

    let pairs = pairs_on(master, today);
    if pairs.is_empty() {
        return StepOutcome::skipped(format!("no rows dated {}", today));
    }
    if inputs.personal_factor.is_none() {
        log::warn!("Personal factor unavailable, {} utilization will be empty", entities::FLAGSHIP);
    }
    let results = pairs
        .into_iter()
        .map(|(entity, period)| {
            let value = utilization(master, &entity, &period, today, inputs.personal_factor);
            ((entity, period), value)
        })
        .collect();
    let (rows, nulls) = derived_rows(attributes::UTILIZATION, results, ctx.timestamp);
    let count = rows.len();
    master::append_records(master, rows);
    StepOutcome::ok(format!("{} rows ({} without value)", count, nulls))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_flagship_utilization() {
        let m = master(&[
            ("PB1", "04.2024", "Production Hours", Some(400.0)),
            ("PB1", "04.2024", "Production Hours", Some(435.0)),
            ("PB1", "04.2024", "Arbeitstage", Some(20.0)),
        ]);
        let v = utilization(&m, "PB1", "04.2024", today().date(), Some(1.0)).unwrap();
        // last production-hours row wins: 435 * 100 / (1 * 20 * 3 * 7.25)
        assert!((v - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_flagship_requires_inputs() {
        let day = today().date();
        let m = master(&[("PB1", "04.2024", "Production Hours", Some(435.0))]);
        assert_eq!(utilization(&m, "PB1", "04.2024", day, Some(1.0)), None);

        let m = master(&[
            ("PB1", "04.2024", "Production Hours", Some(435.0)),
            ("PB1", "04.2024", "Arbeitstage", Some(20.0)),
        ]);
        assert_eq!(utilization(&m, "PB1", "04.2024", day, None), None);
        assert_eq!(utilization(&m, "PB1", "04.2024", day, Some(0.0)), None);
    }

    #[test]
    fn test_other_lines_use_headcount_ratio() {
        let day = today().date();
        let m = master(&[
            ("PB2", "04.2024", "Mitarbeiter(IST)", Some(8.0)),
            ("PB2", "04.2024", "Mitarbeiterbedarf_Brutto(Plan)", Some(6.0)),
        ]);
        assert_eq!(utilization(&m, "PB2", "04.2024", day, None), Some(75.0));

        let m = master(&[("PB3", "04.2024", "Mitarbeiterbedarf_Brutto(Plan)", Some(6.0))]);
        assert_eq!(utilization(&m, "PB3", "04.2024", day, None), None);
    }

    #[test]
    fn test_apply_appends_nulls() {
        let mut m = master(&[
            ("PB2", "04.2024", "Mitarbeiter(IST)", Some(8.0)),
            ("PB2", "04.2024", "Mitarbeiterbedarf_Brutto(Plan)", Some(6.0)),
            ("PB3", "04.2024", "Mitarbeiter(IST)", Some(0.0)),
            ("PB2", "04.2024", "Utilization", Some(1.0)),
        ]);
        let inputs = CalcInputs {
            oee: 0.807,
            personal_factor: None,
        };
        let outcome = apply(&mut m, &RunContext::at(today(), true), &inputs);
        assert_eq!(outcome, StepOutcome::ok("2 rows (1 without value)"));

        let rows: Vec<_> = m.records.iter().filter(|r| r.attribute == "Utilization").collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(75.0));
        assert_eq!(rows[1].value, None);
    }
}
