//! Exports Job - PB and SMT planning exports into master files
//!
//! Responsibilities:
//! - Sweep rows older than the retention window out of the output workbooks
//! - Collect the PB total rows into the combined production-hours files
//! - Unpivot every PB export into the PB master files
//! - Unpivot the SMT exports into the SMT master files
//! - Unpivot the SMT load exports, tagging the SMT0 rows with their load kind
//! - Write a run report
//!
//! Usage:
//!   exports --config config/config.yaml
//!   exports --skip-retention --dry-run

use anyhow::{Context, Result};
use capacity::config::{self, CadencePaths, Config};
use capacity::schema::{attributes, columns, files};
use capacity::table::{Cell, Table};
use capacity::unpivot::{melt, period_columns};
use capacity::workbook::{self, ExportOptions};
use capacity::{logging, master, normalize, period, retention};
use capacity::{RunContext, RunReport, StepOutcome};
use chrono::NaiveDateTime;
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "exports", about = "Loads PB and SMT exports into master files")]
struct Args {
    /// Path to the YAML config file
    #[arg(long, env = "PLANNING_CONFIG")]
    config: Option<PathBuf>,

    /// Dry run - compute and report, write no files
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Skip the retention sweep of the output directory
    #[arg(long, default_value = "false")]
    skip_retention: bool,
}

const PB_KEYS: [&str; 6] = [
    columns::CUSTOMER_TYPE,
    columns::SMT_TYPE,
    columns::PB_TYPE,
    columns::PERIOD,
    columns::ATTRIBUTE,
    columns::DATE,
];

const SMT_KEYS: [&str; 4] = [
    columns::SMT_TYPE,
    columns::PERIOD,
    columns::FREQUENCY,
    columns::DATE,
];

/// Positions of the raw load export that carry no load data.
const LOAD_DROPPED_POSITIONS: [usize; 8] = [0, 1, 4, 5, 6, 7, 8, 9];
const LOAD_CAPACITY: &str = "Netto-Kap. Ressource [%]";
const LOAD_AVERAGE: &str = "Durchschnitt";
const LOAD_KIND: &str = "Belastungsart";
const LOAD_AREA: &str = "PB1";
const SMT_ZERO: &str = "SMT0";
const KEY_GLYPH: &str = "🔑";

const LOAD_KEYS: [&str; 4] = [columns::SMT_TYPE, LOAD_KIND, columns::PERIOD, columns::DATE];

static LOAD_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Jan|Feb|Mrz|Mär|Apr|Mai|Jun|Jul|Aug|Sep|Okt|Nov|Dez)\w*\.?\s*(\d{4})$")
        .expect("valid regex")
});

fn read(path: &Path) -> capacity::Result<Table> {
    workbook::read_export(path, ExportOptions::default())
}

/// Adds `Attribute = Production Hours` and the run timestamp.
fn stamp_production_hours(table: &mut Table, timestamp: NaiveDateTime) {
    table.set_column(columns::ATTRIBUTE, Cell::text(attributes::PRODUCTION_HOURS));
    table.set_column(columns::DATE, Cell::DateTime(timestamp));
}

// =============================================================================
// Combined Production Hours
// =============================================================================

/// The first data row of a PB export is the area total. Returns it as a
/// one-row table led by `PB Type`.
fn pb_total_row(export: &Table, pb_type: &str) -> Option<Table> {
    let first = export.rows().first()?;
    let mut header = vec![columns::PB_TYPE.to_string()];
    let mut row = vec![Cell::text(pb_type)];
    for (name, cell) in export.columns().iter().zip(first) {
        if name.trim() != columns::PB_TYPE {
            header.push(name.trim().to_string());
            row.push(cell.clone());
        }
    }
    let mut table = Table::new(header);
    table.push_row(row);
    Some(table)
}

/// Melts the collected PB total rows into long production-hours rows.
fn combined_long(totals: &[Table], timestamp: NaiveDateTime) -> capacity::Result<Option<Table>> {
    let Some(combined) = totals.iter().cloned().reduce(|acc, t| acc.concat(&t)) else {
        return Ok(None);
    };
    let mut long = melt(&combined, &[columns::PB_TYPE], &period_columns(&combined))?;
    if long.is_empty() {
        return Ok(None);
    }
    stamp_production_hours(&mut long, timestamp);
    Ok(Some(long))
}

/// Appends the totals to the combined file and rewrites its dated copy.
/// Weekly copies take month and quarter from `month_reference` when given.
fn write_combined(
    totals: &[Table],
    combined_path: &Path,
    dated_path: &Path,
    month_reference: Option<&Table>,
    ctx: &RunContext,
    dry_run: bool,
) -> capacity::Result<StepOutcome> {
    let Some(long) = combined_long(totals, ctx.timestamp)? else {
        return Ok(StepOutcome::skipped("no PB totals"));
    };
    if dry_run {
        return Ok(StepOutcome::ok(format!("{} rows (dry run)", long.height())));
    }
    let summary = master::append_file(combined_path, &long, &[])?;

    let mut dated = master::load(combined_path)?;
    period::add_period_columns(&mut dated, columns::PERIOD, ctx.year());
    if let Some(monthly) = month_reference {
        let mapped = period::map_week_to_month_and_quarter(&mut dated, monthly, ctx.year());
        log::info!("Month and quarter taken from the monthly file for {} rows", mapped);
    }
    workbook::write_table(dated_path, &dated)?;
    Ok(StepOutcome::ok(format!(
        "{}; dated copy {}",
        summary,
        dated_path.display()
    )))
}

// =============================================================================
// PB / SMT Ingestion
// =============================================================================

/// Long PB rows: one per customer row and period. The SMT line stays part
/// of the row identity when the export has one.
fn pb_long(export: Table, pb_type: &str, timestamp: NaiveDateTime, year: i32) -> capacity::Result<Table> {
    let table = normalize::normalize_pb_export(export);
    let periods = period_columns(&table);
    if periods.is_empty() {
        return Ok(Table::default());
    }
    let mut ids = vec![columns::CUSTOMER_TYPE];
    if table.has_column(columns::SMT_TYPE) {
        ids.push(columns::SMT_TYPE);
    }
    let mut long = melt(&table, &ids, &periods)?;
    long.set_column(columns::PB_TYPE, Cell::text(pb_type));
    stamp_production_hours(&mut long, timestamp);
    period::add_period_columns(&mut long, columns::PERIOD, year);
    Ok(long)
}

/// Value columns of an SMT export for a cadence.
fn smt_value_columns(table: &Table, cadence: &str) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| c.as_str() != columns::SMT_TYPE)
        .filter(|c| match cadence {
            "monthly" => c.contains('.'),
            _ => c.starts_with("KW"),
        })
        .cloned()
        .collect()
}

/// Long SMT rows. `None` when the export has no workplace column.
fn smt_long(
    export: Table,
    cadence: &str,
    timestamp: NaiveDateTime,
    year: i32,
) -> capacity::Result<Option<Table>> {
    let Some(table) = normalize::normalize_smt_export(export) else {
        return Ok(None);
    };
    let values = smt_value_columns(&table, cadence);
    if values.is_empty() {
        log::warn!("No {} value columns in SMT export", cadence);
        return Ok(Some(Table::default()));
    }
    let mut long = melt(&table, &[columns::SMT_TYPE], &values)?;
    long.set_column(columns::FREQUENCY, Cell::text(cadence));
    long.set_column(columns::DATE, Cell::DateTime(timestamp));
    period::add_period_columns(&mut long, columns::PERIOD, year);
    Ok(Some(long))
}

/// Appends one export's long rows. A re-run within the same hour replaces the
/// earlier batch instead of adding to it.
fn append_long(path: &Path, long: &Table, keys: &[&str], dry_run: bool) -> capacity::Result<StepOutcome> {
    if long.is_empty() {
        return Ok(StepOutcome::skipped("no period columns"));
    }
    if dry_run {
        return Ok(StepOutcome::ok(format!("{} rows (dry run)", long.height())));
    }
    Ok(StepOutcome::ok(master::replace_file(path, long, keys)?.to_string()))
}

fn pb_master(config: &Config, cadence: &str) -> PathBuf {
    match cadence {
        "monthly" => config.output_file(files::PB_MASTER_MONTHLY),
        _ => config.output_file(files::PB_MASTER_WEEKLY),
    }
}

fn smt_master(config: &Config, cadence: &str) -> PathBuf {
    match cadence {
        "monthly" => config.output_file(files::SMT_MASTER_MONTHLY),
        _ => config.output_file(files::SMT_MASTER_WEEKLY),
    }
}

/// Runs PB ingestion for every configured area and cadence, collecting the
/// total rows per cadence along the way.
fn run_pb(
    config: &Config,
    ctx: &RunContext,
    report: &mut RunReport,
    dry_run: bool,
) -> BTreeMap<&'static str, Vec<Table>> {
    let mut totals: BTreeMap<&'static str, Vec<Table>> = BTreeMap::new();
    let inputs: &BTreeMap<String, CadencePaths> = &config.data_extraction.pb_input_files;

    for (pb_type, paths) in inputs {
        for (cadence, path) in paths.entries() {
            let step = format!("pb:{}:{}", pb_type, cadence);
            println!("\n>> Processing {} | {}", pb_type, cadence);
            if !path.exists() {
                report.record(step, StepOutcome::skipped(format!("{} not found", path.display())));
                continue;
            }
            let export = match read(path) {
                Ok(t) => t,
                Err(e) => {
                    report.record(step, StepOutcome::failed(e));
                    continue;
                }
            };
            match pb_total_row(&normalize::rename_pb_export(export.clone()), pb_type) {
                Some(total) => totals.entry(cadence).or_default().push(total),
                None => log::warn!("No total row in {} {} export", pb_type, cadence),
            }
            let outcome = pb_long(export, pb_type, ctx.timestamp, ctx.year())
                .and_then(|long| append_long(&pb_master(config, cadence), &long, &PB_KEYS, dry_run));
            report.record(step, outcome);
        }
    }
    totals
}

fn run_smt(config: &Config, ctx: &RunContext, report: &mut RunReport, dry_run: bool) {
    for (cadence, path) in config.data_extraction.smt_input_files.entries() {
        let step = format!("smt:{}", cadence);
        println!("\n>> Processing SMT | {}", cadence);
        if !path.exists() {
            report.record(step, StepOutcome::skipped(format!("{} not found", path.display())));
            continue;
        }
        let outcome = read(path)
            .and_then(|export| smt_long(export, cadence, ctx.timestamp, ctx.year()))
            .and_then(|long| match long {
                Some(long) => append_long(&smt_master(config, cadence), &long, &SMT_KEYS, dry_run),
                None => Ok(StepOutcome::skipped(format!(
                    "'{}' column missing",
                    columns::WORKPLACE
                ))),
            });
        report.record(step, outcome);
    }
}

// =============================================================================
// SMT Load
// =============================================================================

fn month_number(abbreviation: &str) -> Option<u32> {
    let n = match abbreviation {
        "Jan" => 1,
        "Feb" => 2,
        "Mrz" | "Mär" => 3,
        "Apr" => 4,
        "Mai" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Okt" => 10,
        "Nov" => 11,
        "Dez" => 12,
        _ => return None,
    };
    Some(n)
}

/// Cleans a load export header. German month headers (`Jan 2025`) become
/// `MM.YYYY`; quarter headers are kept.
fn load_header(name: &str) -> String {
    let cleaned = name.replace(KEY_GLYPH, "").replace(',', "").replace("...", "");
    let cleaned = cleaned.trim();
    LOAD_MONTH
        .captures(cleaned)
        .and_then(|c| Some(format!("{:02}.{}", month_number(&c[1])?, &c[2])))
        .unwrap_or_else(|| cleaned.to_string())
}

fn trim_load_export(mut table: Table) -> Table {
    let dropped: Vec<String> = LOAD_DROPPED_POSITIONS
        .iter()
        .filter_map(|&i| table.columns().get(i).cloned())
        .collect();
    table.drop_columns(|c| dropped.iter().any(|d| d == c));
    table.map_columns(load_header);
    table
}

/// Splits off the `SMT0` rows.
fn split_smt_zero(table: Table) -> (Table, Table) {
    let idx = table.column_index(columns::SMT_TYPE);
    let is_zero = move |row: &[Cell]| idx.map_or(false, |i| row[i].key() == SMT_ZERO);
    let mut zero = table.clone();
    zero.retain_rows(is_zero);
    let mut lines = table;
    lines.retain_rows(|row| !is_zero(row));
    (lines, zero)
}

/// SMT0 rows come in pairs: personnel load, then machine load.
fn tag_load_kind(table: &mut Table) {
    let mut i = 0;
    table.derive_column(LOAD_KIND, |_| {
        let kind = if i % 2 == 0 { "Personal" } else { "Maschine" };
        i += 1;
        Cell::text(kind)
    });
}

fn melt_load(table: &Table) -> capacity::Result<Table> {
    if table.is_empty() {
        return Ok(Table::default());
    }
    let ids: Vec<&str> = [
        columns::SMT_TYPE,
        LOAD_CAPACITY,
        LOAD_AVERAGE,
        columns::PB_TYPE,
        columns::DATE,
        LOAD_KIND,
    ]
    .into_iter()
    .filter(|c| table.has_column(c))
    .collect();
    let values: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !ids.contains(&c.as_str()))
        .cloned()
        .collect();
    melt(table, &ids, &values)
}

/// Long rows of an SMT load export. `None` when the export has no workplace
/// column.
fn smt_load_long(export: Table, timestamp: NaiveDateTime, year: i32) -> capacity::Result<Option<Table>> {
    let Some(mut table) = normalize::normalize_smt_export(trim_load_export(export)) else {
        return Ok(None);
    };
    table.set_column(columns::PB_TYPE, Cell::text(LOAD_AREA));
    table.set_column(columns::DATE, Cell::DateTime(timestamp));

    let (lines, mut zero) = split_smt_zero(table);
    tag_load_kind(&mut zero);
    let mut long = melt_load(&lines)?.concat(&melt_load(&zero)?);
    if long.is_empty() {
        return Ok(Some(long));
    }
    period::add_period_columns(&mut long, columns::PERIOD, year);
    Ok(Some(long))
}

fn load_master(config: &Config, kind: &str) -> Option<PathBuf> {
    match kind {
        "12months" => Some(config.output_file(files::SMT_LOAD_12_MONTHS)),
        "5quarters" => Some(config.output_file(files::SMT_LOAD_5_QUARTERS)),
        _ => None,
    }
}

fn run_smt_load(config: &Config, ctx: &RunContext, report: &mut RunReport, dry_run: bool) {
    for (kind, path) in &config.data_extraction.smt_load_files {
        let step = format!("smt_load:{}", kind);
        println!("\n>> Processing SMT Load Table | {}", kind);
        let Some(master_path) = load_master(config, kind) else {
            report.record(step, StepOutcome::skipped(format!("unknown load table '{}'", kind)));
            continue;
        };
        if !path.exists() {
            report.record(step, StepOutcome::skipped(format!("{} not found", path.display())));
            continue;
        }
        let outcome = read(path)
            .and_then(|export| smt_load_long(export, ctx.timestamp, ctx.year()))
            .and_then(|long| match long {
                Some(long) => append_long(&master_path, &long, &LOAD_KEYS, dry_run),
                None => Ok(StepOutcome::skipped(format!(
                    "'{}' column missing",
                    columns::WORKPLACE
                ))),
            });
        report.record(step, outcome);
    }
}

fn run_retention(config: &Config, ctx: &RunContext, report: &mut RunReport, dry_run: bool) {
    let dir = &config.output_dir;
    if !dir.exists() {
        report.record("retention", StepOutcome::skipped(format!("{} not found", dir.display())));
        return;
    }
    let swept = retention::sweep_dir(
        dir,
        &config.retention.date_column,
        config.retention.months_to_keep,
        ctx.started_at,
        dry_run,
    );
    match swept {
        Ok(outcomes) => {
            for (path, outcome) in outcomes {
                let name = path.strip_prefix(dir).unwrap_or(&path).display().to_string();
                report.record(format!("retention:{}", name), outcome);
            }
        }
        Err(e) => report.record("retention", StepOutcome::failed(e)),
    }
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
    let mut report = RunReport::new("exports", &ctx);

    println!("=== PB / SMT Exports ===");
    println!("Run: {}", ctx.run_id);
    println!("Output: {}", config.output_dir.display());
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    if args.skip_retention {
        report.record("retention", StepOutcome::skipped("--skip-retention"));
    } else {
        println!("\nDeleting rows older than {} months...", config.retention.months_to_keep);
        run_retention(&config, &ctx, &mut report, args.dry_run);
    }

    let totals = run_pb(&config, &ctx, &mut report, args.dry_run);
    let mut monthly_dated: Option<Table> = None;
    for (cadence, combined, dated) in [
        ("monthly", files::COMBINED_MONTHLY, files::COMBINED_MONTHLY_DATED),
        ("weekly", files::COMBINED_WEEKLY, files::COMBINED_WEEKLY_DATED),
    ] {
        let rows = totals.get(cadence).map(Vec::as_slice).unwrap_or_default();
        let outcome = write_combined(
            rows,
            &config.output_file(combined),
            &config.output_file(dated),
            monthly_dated.as_ref(),
            &ctx,
            args.dry_run,
        );
        report.record(format!("combined:{}", cadence), outcome);
        if cadence == "monthly" {
            monthly_dated = master::load(&config.output_file(dated)).ok().filter(|t| !t.is_empty());
        }
    }

    run_smt(&config, &ctx, &mut report, args.dry_run);
    run_smt_load(&config, &ctx, &mut report, args.dry_run);

    println!("\n=== Run Summary ===");
    print!("{}", report.summary());
    if !args.dry_run {
        let path = report
            .write_json(&config.report_dir())
            .context("Failed to write run report")?;
        println!("Report: {}", path.display());
    }
    if report.has_failures() {
        log::warn!("Run finished with failures");
    }
    Ok(())
}
