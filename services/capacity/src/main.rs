//! Capacity Job - Planning workbook into master files and derived metrics
//!
//! Responsibilities:
//! - Extract the fixed regions of the capacity planning workbook
//! - Normalize headers and unpivot period columns into long rows
//! - Append quota, headcount and working-day rows to the master files
//! - Feed combined production hours into the master files
//! - Recompute today's maintenance, headcount, variance and utilization
//! - Write a run report
//!
//! Usage:
//!   capacity --config config/config.yaml
//!   capacity --dry-run

use anyhow::{Context, Result};
use capacity::calc::{headcount, personal_factor, CalcInputs};
use capacity::config::{self, Config};
use capacity::record::{LongTable, Record};
use capacity::region::{self, Extraction};
use capacity::schema::{attributes, columns, entities, files, LONG_KEYS};
use capacity::table::{Cell, Table};
use capacity::{logging, master, normalize, period, stages, unpivot};
use capacity::{RunContext, RunReport, StepOutcome};
use chrono::NaiveDateTime;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "capacity", about = "Builds capacity master files and derived planning metrics")]
struct Args {
    /// Path to the YAML config file
    #[arg(long, env = "PLANNING_CONFIG")]
    config: Option<PathBuf>,

    /// Dry run - compute and report, write no files
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

/// Attributes whose region tables go into the master files, per cadence.
const MASTER_ATTRIBUTES: [&str; 7] = [
    attributes::VACATION_QUOTA,
    attributes::SICKNESS_QUOTA,
    attributes::ACTUAL_HEADCOUNT,
    attributes::FLEXTIME,
    attributes::DISTRIBUTED_TIME,
    attributes::WORKING_DAYS,
    attributes::SHORT_TIME,
];

const CADENCES: [(&str, &str, &str); 2] = [
    ("monthly", "Monthly", files::MASTER_MONTHLY),
    ("weekly", "Weekly", files::MASTER_WEEKLY),
];

// =============================================================================
// Pipeline Steps
// =============================================================================

fn run_extraction(config: &Config, report: &mut RunReport) -> Option<Extraction> {
    let ex = &config.data_extraction;
    let Some(path) = ex.input_file_path.as_deref() else {
        report.record("extract", StepOutcome::skipped("data_extraction.input_file_path not set"));
        return None;
    };
    if !path.exists() {
        report.record("extract", StepOutcome::skipped(format!("{} not found", path.display())));
        return None;
    }
    let regions = ex.regions.clone().unwrap_or_else(region::default_regions);
    println!("Extracting {} regions from {}", regions.len(), path.display());

    match region::extract(path, &ex.sheet_name, &regions) {
        Ok(extraction) => {
            let detail = format!(
                "{} tables, {} regions skipped",
                extraction.tables.len(),
                extraction.failures.len()
            );
            report.record("extract", StepOutcome::ok(detail));
            Some(extraction)
        }
        Err(e) => {
            report.record("extract", StepOutcome::failed(e));
            None
        }
    }
}

/// Normalizes every extracted table.
fn normalize_tables(extraction: &Extraction) -> BTreeMap<String, Table> {
    extraction
        .tables
        .iter()
        .map(|(name, table)| (name.clone(), normalize::normalize_region(name, table.clone())))
        .collect()
}

/// Collects the master rows of one cadence from the unpivoted tables.
///
/// Weekly `wk.xx.yyyy` periods become `KWxx`; `SMT Gesamt` rows are dropped.
fn master_rows(long_tables: &BTreeMap<String, LongTable>, suffix: &str) -> LongTable {
    let mut records: Vec<Record> = Vec::new();
    for attribute in MASTER_ATTRIBUTES {
        let name = format!("{}_{}", attribute, suffix);
        match long_tables.get(&name) {
            Some(long) => records.extend(long.records.iter().cloned()),
            None => log::warn!("Table '{}' not available for the master file", name),
        }
    }
    records.retain(|r| r.entity.trim() != entities::SMT_TOTAL);
    for r in records.iter_mut() {
        r.period = period::normalize_week_label(&r.period);
    }
    LongTable::with_records(columns::PB_TYPE, records)
}

fn append_master(
    path: &Path,
    incoming: &Table,
    dry_run: bool,
) -> capacity::Result<StepOutcome> {
    if incoming.is_empty() {
        return Ok(StepOutcome::skipped("no rows"));
    }
    if dry_run {
        return Ok(StepOutcome::ok(format!("{} rows (dry run)", incoming.height())));
    }
    let summary = master::append_file(path, incoming, &LONG_KEYS)?;
    Ok(StepOutcome::ok(summary.to_string()))
}

/// Production-hours rows from a combined workbook, restamped with `timestamp`.
fn production_hours_feed(table: &Table, timestamp: NaiveDateTime) -> capacity::Result<Table> {
    let mut feed = table
        .select(&[
            columns::PB_TYPE,
            columns::PERIOD,
            columns::VALUE,
            columns::ATTRIBUTE,
            columns::DATE,
        ])
        .map_err(capacity::PlanningError::MissingColumn)?;
    feed.set_column(columns::DATE, Cell::DateTime(timestamp));
    Ok(feed)
}

fn run_production_hours(
    source: &Path,
    master_path: &Path,
    ctx: &RunContext,
    dry_run: bool,
) -> capacity::Result<StepOutcome> {
    if !source.exists() {
        return Ok(StepOutcome::skipped(format!("{} not found", source.display())));
    }
    let combined = capacity::workbook::read_table(source)?;
    let feed = production_hours_feed(&combined, ctx.timestamp)?;
    append_master(master_path, &feed, dry_run)
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config_path = config::resolve_path(args.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    logging::init(config.log_file.as_deref()).context("Failed to open log file")?;

    let ctx = RunContext::new(config.execution.use_rounded_timestamp);
    let mut report = RunReport::new("capacity", &ctx);

    println!("=== Capacity Planning ===");
    println!("Run: {}", ctx.run_id);
    println!("Timestamp: {}", ctx.timestamp);
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    // Extraction and master append
    let extraction = run_extraction(&config, &mut report);
    let mut inputs = CalcInputs {
        oee: config.oee.default,
        personal_factor: None,
    };

    if let Some(extraction) = &extraction {
        inputs.oee = headcount::oee_fraction(extraction.tables.get("SMT_OEE"), config.oee.default);

        let normalized = normalize_tables(extraction);
        inputs.personal_factor = normalized
            .get("Personal_Factor")
            .and_then(personal_factor::weighted_average);
        match inputs.personal_factor {
            Some(pf) => log::info!("Personal factor: {:.4}", pf),
            None => log::warn!("Personal_Factor table missing"),
        }

        let long_tables = unpivot::unpivot_all(&normalized, ctx.timestamp);
        report.record("unpivot", StepOutcome::ok(format!("{} tables", long_tables.len())));

        for (cadence, suffix, file) in CADENCES {
            let incoming = master_rows(&long_tables, suffix).to_table();
            let outcome = append_master(&config.output_file(file), &incoming, args.dry_run);
            report.record(format!("master:{}", cadence), outcome);
        }
    }
    println!("OEE: {:.3}", inputs.oee);

    // Production hours
    for (cadence, source) in config.combined_total_production_hours.entries() {
        let master_path = config.output_file(master_file(cadence));
        let outcome = run_production_hours(source, &master_path, &ctx, args.dry_run);
        report.record(format!("production_hours:{}", cadence), outcome);
    }

    // Derived metrics
    for (cadence, _, file) in CADENCES {
        println!("\nCalculating {} metrics...", cadence);
        stages::run_calculators(
            &config.output_file(file),
            cadence,
            &ctx,
            &inputs,
            &mut report,
            args.dry_run,
        );
    }

    println!("\n=== Run Summary ===");
    print!("{}", report.summary());
    if !args.dry_run {
        let path = report
            .write_json(&config.report_dir())
            .context("Failed to write run report")?;
        println!("Report: {}", path.display());
    }
    Ok(())
}

fn master_file(cadence: &str) -> &'static str {
    CADENCES
        .iter()
        .find(|(c, _, _)| *c == cadence)
        .map(|(_, _, f)| *f)
        .unwrap_or(files::MASTER_MONTHLY)
}
