//! Net headcount requirement (`Mitarbeiterbedarf_Brutto(Plan)`).
//!
//! ```text
//! production_hours / (Σ working days × 7.25 × (1 − Σ quotas / 100) × oee)
//! ```
//!
//! Production hours include the maintenance allowance on the flagship line,
//! and only the flagship line is scaled by OEE.

use super::{derived_rows, pair_rows, pairs_on, sum_of};
use crate::context::RunContext;
use crate::master;
use crate::normalize::entity_key;
use crate::record::{LongTable, Record};
use crate::report::StepOutcome;
use crate::schema::{attributes, entities, HOURS_PER_DAY};
use crate::table::Table;
use chrono::NaiveDate;

/// OEE used when the workbook does not provide one.
pub const DEFAULT_OEE: f64 = 0.807;

/// OEE fraction from the extracted `SMT_OEE` region (first value, percent).
pub fn oee_fraction(region: Option<&Table>, default: f64) -> f64 {
    let value = region
        .and_then(|t| t.rows().first())
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_f64());
    match value {
        Some(percent) => percent / 100.0,
        None => {
            log::warn!("OEE value missing, using default {} for {}", default, entities::FLAGSHIP);
            default
        }
    }
}

pub fn headcount_requirement(
    master: &LongTable,
    entity: &str,
    period: &str,
    day: NaiveDate,
    oee: f64,
) -> Option<f64> {
    let rows: Vec<&Record> = pair_rows(master, entity, period, day).collect();
    if rows.is_empty() {
        log::warn!("No data for {} / {} on {}", entity, period, day);
        return None;
    }
    let flagship = entity_key(entity) == entities::FLAGSHIP;

    let mut production_hours = sum_of(rows.iter().copied(), attributes::PRODUCTION_HOURS);
    if flagship {
        production_hours += sum_of(rows.iter().copied(), attributes::MAINTENANCE);
    }
    if production_hours <= 0.0 {
        log::debug!("No production hours for {} / {}", entity, period);
        return None;
    }

    let employee_factor = sum_of(rows.iter().copied(), attributes::WORKING_DAYS) * HOURS_PER_DAY;
    let quotas: f64 = attributes::AVAILABILITY_QUOTAS
        .iter()
        .map(|a| sum_of(rows.iter().copied(), a))
        .sum();
    let availability = 1.0 - quotas / 100.0;
    let oee_adjustment = if flagship { oee } else { 1.0 };

    let denominator = employee_factor * availability * oee_adjustment;
    if denominator <= 0.0 {
        log::warn!(
            "Non-positive denominator for {} / {}: {}",
            entity,
            period,
            denominator
        );
        return None;
    }
    Some(production_hours / denominator)
}

/// Recomputes today's headcount requirement for every pair dated today.
///
/// Entity labels are compacted first (`PB 1` → `PB1`) so region rows and
/// production-hour rows land on the same key. `SMT Gesamt` rows are dropped.
pub fn apply(master: &mut LongTable, ctx: &RunContext, oee: f64) -> StepOutcome {
    master.records.retain(|r| r.entity.trim() != entities::SMT_TOTAL);
    for r in master.records.iter_mut() {
        let key = entity_key(&r.entity);
        if key != r.entity {
            r.entity = key;
        }
    }
    let today = ctx.today();
    let removed = master::remove_same_day(master, attributes::HEADCOUNT_REQUIREMENT, today);
    if removed > 0 {
        log::info!("Removed {} existing headcount rows for {}", removed, today);
    }

    let pairs = pairs_on(master, today);
    if pairs.is_empty() {
        return StepOutcome::skipped(format!("no rows dated {}", today));
    }
    let results = pairs
        .into_iter()
        .map(|(entity, period)| {
            let value = headcount_requirement(master, &entity, &period, today, oee);
            ((entity, period), value)
        })
        .collect();
    let (rows, nulls) = derived_rows(attributes::HEADCOUNT_REQUIREMENT, results, ctx.timestamp);
    let count = rows.len();
    master::append_records(master, rows);
    StepOutcome::ok(format!("{} rows ({} without value)", count, nulls))
}
