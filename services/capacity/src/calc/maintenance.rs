//! Maintenance allowance (`Wartung`) for the flagship line.

use crate::context::RunContext;
use crate::master;
use crate::normalize::entity_key;
use crate::record::{LongTable, Record};
use crate::report::StepOutcome;
use crate::schema::{attributes, entities};

/// Hours of maintenance per 200 production hours, in 8-hour units.
pub fn allowance(production_hours: f64, personal_factor: Option<f64>) -> Option<f64> {
    match personal_factor {
        Some(pf) if pf != 0.0 => Some(production_hours * 8.0 / (200.0 * pf)),
        _ => None,
    }
}

/// Adds one `Wartung` row per flagship production-hours row dated today,
/// stamped with that row's date. Runs at most once a day.
pub fn apply(master: &mut LongTable, ctx: &RunContext, personal_factor: Option<f64>) -> StepOutcome {
    let today = ctx.today();
    if master
        .on_day(today)
        .any(|r| r.attribute.trim() == attributes::MAINTENANCE)
    {
        return StepOutcome::skipped(format!("already computed for {}", today));
    }
    if personal_factor.unwrap_or(0.0) == 0.0 {
        log::warn!("Personal factor missing or zero, maintenance values will be empty");
    }

    let rows: Vec<Record> = master
        .on_day(today)
        .filter(|r| {
            entity_key(&r.entity) == entities::FLAGSHIP
                && r.attribute.trim() == attributes::PRODUCTION_HOURS
        })
        .map(|r| {
            let value = r.value.and_then(|v| allowance(v, personal_factor));
            Record::new(r.entity.clone(), r.period.clone(), attributes::MAINTENANCE, value, r.date)
        })
        .collect();
    if rows.is_empty() {
        return StepOutcome::skipped(format!(
            "no {} production hours dated {}",
            entities::FLAGSHIP,
            today
        ));
    }

    let nulls = rows.iter().filter(|r| r.value.is_none()).count();
    let count = rows.len();
    master::append_records(master, rows);
    StepOutcome::ok(format!("{} rows ({} without value)", count, nulls))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_allowance() {
        assert_eq!(allowance(1000.0, Some(1.0)), Some(40.0));
        assert_eq!(allowance(1000.0, Some(2.0)), Some(20.0));
        assert_eq!(allowance(1000.0, Some(0.0)), None);
        assert_eq!(allowance(1000.0, None), None);
    }

    #[test]
    fn test_apply_flagship_only() {
        let mut m = master(&[
            ("PB1", "04.2024", "Production Hours", Some(1000.0)),
            ("PB1", "05.2024", "Production Hours", Some(500.0)),
            ("PB2", "04.2024", "Production Hours", Some(700.0)),
            ("PB1", "04.2024", "Arbeitstage", Some(20.0)),
        ]);
        let outcome = apply(&mut m, &RunContext::at(today(), true), Some(1.0));
        assert!(matches!(outcome, StepOutcome::Ok { .. }));

        let rows: Vec<_> = m.records.iter().filter(|r| r.attribute == "Wartung").collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period, "04.2024");
        assert_eq!(rows[0].value, Some(40.0));
        assert_eq!(rows[1].value, Some(20.0));
    }

    #[test]
    fn test_apply_keeps_source_row_date() {
        let morning = today() - chrono::Duration::hours(5);
        let mut m = LongTable::with_records(
            "PB Type",
            vec![Record::new("PB1", "04.2024", "Production Hours", Some(1000.0), morning)],
        );
        apply(&mut m, &RunContext::at(today(), true), Some(1.0));
        assert_eq!(m.records[1].attribute, "Wartung");
        assert_eq!(m.records[1].date, morning);
    }

    #[test]
    fn test_apply_once_per_day() {
        let mut m = master(&[("PB1", "04.2024", "Production Hours", Some(1000.0))]);
        let ctx = RunContext::at(today(), true);
        apply(&mut m, &ctx, Some(1.0));
        let second = apply(&mut m, &ctx, Some(2.0));
        assert!(matches!(second, StepOutcome::Skipped { .. }));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_apply_ignores_older_rows() {
        let mut m = LongTable::with_records(
            "PB Type",
            vec![Record::new("PB1", "04.2024", "Production Hours", Some(1.0), yesterday())],
        );
        let outcome = apply(&mut m, &RunContext::at(today(), true), Some(1.0));
        assert!(matches!(outcome, StepOutcome::Skipped { .. }));
    }

    #[test]
    fn test_apply_without_factor_appends_nulls() {
        let mut m = master(&[("PB1", "04.2024", "Production Hours", Some(1000.0))]);
        apply(&mut m, &RunContext::at(today(), true), None);
        assert_eq!(m.records[1].attribute, "Wartung");
        assert_eq!(m.records[1].value, None);
    }
}
