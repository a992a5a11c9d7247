//! Ordered calculator stages over one master file.

use crate::calc::{self, CalcInputs};
use crate::context::RunContext;
use crate::error::Result;
use crate::master;
use crate::record::LongTable;
use crate::report::{RunReport, StepOutcome};
use crate::schema::{attributes, columns};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Maintenance,
    Headcount,
    Variance,
    Utilization,
}

impl Stage {
    /// Execution order. Every stage comes after its prerequisites.
    pub const ORDER: [Stage; 4] = [
        Stage::Maintenance,
        Stage::Headcount,
        Stage::Variance,
        Stage::Utilization,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Maintenance => "maintenance",
            Stage::Headcount => "headcount",
            Stage::Variance => "variance",
            Stage::Utilization => "utilization",
        }
    }

    /// Attribute the stage appends.
    pub fn attribute(&self) -> &'static str {
        match self {
            Stage::Maintenance => attributes::MAINTENANCE,
            Stage::Headcount => attributes::HEADCOUNT_REQUIREMENT,
            Stage::Variance => attributes::VARIANCE,
            Stage::Utilization => attributes::UTILIZATION,
        }
    }

    pub fn prerequisites(&self) -> &'static [Stage] {
        match self {
            Stage::Maintenance => &[],
            Stage::Headcount => &[Stage::Maintenance],
            Stage::Variance | Stage::Utilization => &[Stage::Headcount],
        }
    }

    pub fn run(&self, master: &mut LongTable, ctx: &RunContext, inputs: &CalcInputs) -> StepOutcome {
        match self {
            Stage::Maintenance => calc::maintenance::apply(master, ctx, inputs.personal_factor),
            Stage::Headcount => calc::headcount::apply(master, ctx, inputs.oee),
            Stage::Variance => calc::variance::apply(master, ctx),
            Stage::Utilization => calc::utilization::apply(master, ctx, inputs),
        }
    }
}

/// Runs every stage against the master at `path`, recording one step per
/// stage as `<stage>:<cadence>`.
///
/// The file is loaded once and rewritten after each stage that produced rows.
/// A stage whose prerequisite failed is skipped.
pub fn run_calculators(
    path: &Path,
    cadence: &str,
    ctx: &RunContext,
    inputs: &CalcInputs,
    report: &mut RunReport,
    dry_run: bool,
) {
    let step = |s: Stage| format!("{}:{}", s.name(), cadence);

    if !path.exists() {
        for s in Stage::ORDER {
            report.record(step(s), StepOutcome::skipped(format!("{} not found", path.display())));
        }
        return;
    }
    let mut table = match master::load_long(path, columns::PB_TYPE) {
        Ok(t) => t,
        Err(e) => {
            for s in Stage::ORDER {
                report.record(step(s), StepOutcome::failed(format!("load failed: {}", e)));
            }
            return;
        }
    };
    log::info!("Loaded {} rows from {}", table.len(), path.display());

    let mut failed: Vec<Stage> = Vec::new();
    for s in Stage::ORDER {
        if let Some(p) = s.prerequisites().iter().find(|p| failed.contains(*p)) {
            failed.push(s);
            report.record(step(s), StepOutcome::skipped(format!("prerequisite {} failed", p.name())));
            continue;
        }
        let outcome: StepOutcome = run_stage(s, path, &mut table, ctx, inputs, dry_run).into();
        if let StepOutcome::Failed { .. } = outcome {
            failed.push(s);
        }
        report.record(step(s), outcome);
    }
}

fn run_stage(
    stage: Stage,
    path: &Path,
    table: &mut LongTable,
    ctx: &RunContext,
    inputs: &CalcInputs,
    dry_run: bool,
) -> Result<StepOutcome> {
    let outcome = stage.run(table, ctx, inputs);
    if matches!(outcome, StepOutcome::Ok { .. }) && !dry_run {
        master::save_long(path, table)?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chrono::NaiveDateTime;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-04-03 14:20:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_prerequisites_run_first() {
        for (i, s) in Stage::ORDER.iter().enumerate() {
            for p in s.prerequisites() {
                let j = Stage::ORDER.iter().position(|o| o == p).unwrap();
                assert!(j < i, "{} must run after {}", s.name(), p.name());
            }
        }
    }

    #[test]
    fn test_missing_master_skips_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::at(now(), true);
        let mut report = RunReport::new("capacity", &ctx);
        let inputs = CalcInputs {
            oee: 0.807,
            personal_factor: Some(1.0),
        };
        run_calculators(&dir.path().join("missing.xlsx"), "monthly", &ctx, &inputs, &mut report, false);
        assert_eq!(report.counts().skipped, 4);
    }

    #[test]
    fn test_full_run_writes_every_metric() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master_file_monthly.xlsx");
        let ctx = RunContext::at(now(), true);
        let ts = ctx.timestamp;
        let seed = LongTable::with_records(
            "PB Type",
            vec![
                Record::new("PB 1", "04.2024", "Production Hours", Some(1000.0), ts),
                Record::new("PB1", "04.2024", "Arbeitstage", Some(20.0), ts),
                Record::new("PB1", "04.2024", "Mitarbeiter(IST)", Some(12.0), ts),
                Record::new("PB2", "04.2024", "Production Hours", Some(580.0), ts),
                Record::new("PB2", "04.2024", "Arbeitstage", Some(20.0), ts),
                Record::new("PB2", "04.2024", "Mitarbeiter(IST)", Some(5.0), ts),
            ],
        );
        master::save_long(&path, &seed).unwrap();

        let inputs = CalcInputs {
            oee: 0.807,
            personal_factor: Some(1.0),
        };
        let mut report = RunReport::new("capacity", &ctx);
        run_calculators(&path, "monthly", &ctx, &inputs, &mut report, false);
        assert!(!report.has_failures(), "{}", report.summary());

        let stored = master::load_long(&path, "PB Type").unwrap();
        for s in Stage::ORDER {
            assert!(
                stored.records.iter().any(|r| r.attribute == s.attribute()),
                "missing {}",
                s.attribute()
            );
        }
        let pb2_need = stored
            .records
            .iter()
            .find(|r| r.entity == "PB2" && r.attribute == "Mitarbeiterbedarf_Brutto(Plan)")
            .unwrap();
        assert!((pb2_need.value.unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_dry_run_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master_file_weekly.xlsx");
        let ctx = RunContext::at(now(), true);
        let seed = LongTable::with_records(
            "PB Type",
            vec![Record::new("PB2", "KW14", "Mitarbeiter(IST)", Some(5.0), ctx.timestamp)],
        );
        master::save_long(&path, &seed).unwrap();

        let inputs = CalcInputs {
            oee: 0.807,
            personal_factor: None,
        };
        let mut report = RunReport::new("capacity", &ctx);
        run_calculators(&path, "weekly", &ctx, &inputs, &mut report, true);
        assert_eq!(master::load_long(&path, "PB Type").unwrap().len(), 1);
    }
}
