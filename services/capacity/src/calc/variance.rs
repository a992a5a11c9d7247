//! Staffing variance (`Abweichung`): actual headcount minus requirement.

use super::{derived_rows, pair_rows, pairs_on};
use crate::context::RunContext;
use crate::master;
use crate::record::LongTable;
use crate::report::StepOutcome;
use crate::schema::attributes;
use chrono::NaiveDate;

/// Latest value of `attribute` for the pair.
///
/// `Some(0.0)` when no row exists, `None` when the latest row has no value.
fn latest(master: &LongTable, entity: &str, period: &str, day: NaiveDate, attribute: &str) -> Option<f64> {
    pair_rows(master, entity, period, day)
        .filter(|r| r.attribute.trim() == attribute)
        .last()
        .map_or(Some(0.0), |r| r.value)
}

pub fn variance(master: &LongTable, entity: &str, period: &str, day: NaiveDate) -> Option<f64> {
    let actual = latest(master, entity, period, day, attributes::ACTUAL_HEADCOUNT);
    let requirement = latest(master, entity, period, day, attributes::HEADCOUNT_REQUIREMENT);
    match (actual, requirement) {
        (Some(a), Some(r)) => Some(a - r),
        _ => {
            log::debug!("Variance for {} / {} has an empty input", entity, period);
            None
        }
    }
}

pub fn apply(master: &mut LongTable, ctx: &RunContext) -> StepOutcome {
    let today = ctx.today();
    if master.on_day(today).next().is_none() {
        return StepOutcome::skipped(format!("no rows dated {}", today));
    }
    master::remove_same_day(master, attributes::VARIANCE, today);

    let results = pairs_on(master, today)
        .into_iter()
        .map(|(entity, period)| {
            let value = variance(master, &entity, &period, today);
            ((entity, period), value)
        })
        .collect();
    let (rows, nulls) = derived_rows(attributes::VARIANCE, results, ctx.timestamp);
    let count = rows.len();
    master::append_records(master, rows);
    StepOutcome::ok(format!("{} rows ({} without value)", count, nulls))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::record::Record;

    #[test]
    fn test_variance_uses_latest_rows() {
        let mut m = master(&[
            ("PB1", "04.2024", "Mitarbeiter(IST)", Some(11.0)),
            ("PB1", "04.2024", "Mitarbeiter(IST)", Some(12.0)),
            ("PB1", "04.2024", "Mitarbeiterbedarf_Brutto(Plan)", Some(10.72)),
        ]);
        m.records.push(Record::new(
            "PB1",
            "04.2024",
            "Mitarbeiter(IST)",
            Some(40.0),
            yesterday(),
        ));
        let v = variance(&m, "PB1", "04.2024", today().date()).unwrap();
        assert!((v - 1.28).abs() < 1e-9);
    }

    #[test]
    fn test_missing_actual_defaults_to_zero() {
        let m = master(&[("PB1", "04.2024", "Mitarbeiterbedarf_Brutto(Plan)", Some(10.72))]);
        let v = variance(&m, "PB1", "04.2024", today().date()).unwrap();
        assert!((v + 10.72).abs() < 1e-9);
    }

    #[test]
    fn test_empty_requirement_propagates() {
        let m = master(&[
            ("PB2", "04.2024", "Mitarbeiter(IST)", Some(4.0)),
            ("PB2", "04.2024", "Mitarbeiterbedarf_Brutto(Plan)", None),
        ]);
        assert_eq!(variance(&m, "PB2", "04.2024", today().date()), None);
    }

    #[test]
    fn test_apply_replaces_todays_variance() {
        let mut m = master(&[
            ("PB1", "04.2024", "Mitarbeiter(IST)", Some(12.0)),
            ("PB1", "04.2024", "Mitarbeiterbedarf_Brutto(Plan)", Some(10.0)),
            ("PB1", "04.2024", "Abweichung", Some(-99.0)),
        ]);
        let outcome = apply(&mut m, &RunContext::at(today(), true));
        assert!(matches!(outcome, StepOutcome::Ok { .. }));

        let rows: Vec<_> = m.records.iter().filter(|r| r.attribute == "Abweichung").collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, Some(2.0));
    }

    #[test]
    fn test_apply_skips_without_todays_rows() {
        let mut m = LongTable::with_records(
            "PB Type",
            vec![Record::new("PB1", "04.2024", "Mitarbeiter(IST)", Some(3.0), yesterday())],
        );
        let outcome = apply(&mut m, &RunContext::at(today(), true));
        assert!(matches!(outcome, StepOutcome::Skipped { .. }));
        assert_eq!(m.len(), 1);
    }
}
