//! Backlog Job - Production backlog export into history and weekly totals
//!
//! Responsibilities:
//! - Read the outline-style backlog export and clean its headers
//! - Drop rows without material and internal order numbers
//! - Append the cleaned rows, stamped with the run timestamp, to the history
//! - Sum this week's remaining load per comment into the weekly workbook
//!
//! Usage:
//!   backlog --config config/config.yaml
//!   backlog --skip-weekly

use anyhow::{Context, Result};
use capacity::config::{self, BacklogConfig, Config};
use capacity::schema::columns;
use capacity::table::{Cell, Table};
use capacity::workbook::{self, ExportOptions};
use capacity::{logging, master};
use capacity::{RunContext, RunReport, StepOutcome};
use chrono::{Datelike, NaiveDateTime};
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "backlog", about = "Appends the production backlog and builds weekly totals")]
struct Args {
    /// Path to the YAML config file
    #[arg(long, env = "PLANNING_CONFIG")]
    config: Option<PathBuf>,

    /// Dry run - compute and report, write no files
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Skip the weekly aggregation
    #[arg(long, default_value = "false")]
    skip_weekly: bool,
}

const KEY_GLYPH: &str = "🔑";
const MATERIAL: &str = "Materialnummer";
const ORDER: &str = "Auftragsnummer";
const COMMENT: &str = "Kommentar in Prod - INFO11";
const REMAINING_LOAD: &str = "Rest-Belastung Gesamt Personal aktuel";

/// Order numbers in this range are internal and never part of the backlog.
const INTERNAL_ORDERS: std::ops::RangeInclusive<f64> = 1.0..=500.0;

static SCENARIO_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(Szen\.:Produktiv.*\)").expect("valid regex"));
static HOURS_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+):(\d+)\s*$").expect("valid regex"));

// =============================================================================
// Cleaning
// =============================================================================

fn clean_header(name: &str) -> String {
    name.replace(KEY_GLYPH, "").trim().to_string()
}

/// Cleans a parsed backlog export and stamps every row with `timestamp`.
fn clean_backlog(mut table: Table, settings: &BacklogConfig, timestamp: NaiveDateTime) -> Table {
    table.map_columns(clean_header);
    table.drop_columns(|c| settings.drop_columns.iter().any(|d| d == c));
    table.map_columns(|c| SCENARIO_SUFFIX.replace_all(c, " aktuel").into_owned());

    if let Some(idx) = table.column_index(MATERIAL) {
        table.retain_rows(|row| !row[idx].is_empty());
    }
    if table.update_column(ORDER, |cell| Cell::from_opt(cell.as_f64())) {
        if let Some(idx) = table.column_index(ORDER) {
            table.retain_rows(|row| {
                !row[idx]
                    .as_f64()
                    .map(|n| INTERNAL_ORDERS.contains(&n))
                    .unwrap_or(false)
            });
        }
    }

    for extra in &settings.extra_columns {
        if !table.has_column(extra) {
            table.set_column(extra, Cell::Empty);
        }
    }
    table.set_column(columns::DATE, Cell::DateTime(timestamp));
    table
}

/// Appends `incoming` to the history workbook. An unreadable history is
/// replaced.
fn append_history(path: &Path, incoming: &Table) -> capacity::Result<StepOutcome> {
    let existing = match master::load(path) {
        Ok(t) => t,
        Err(e) => {
            log::error!("Error reading {}: {}. Creating a new file.", path.display(), e);
            Table::default()
        }
    };
    let merged = master::append(&existing, incoming, &[]);
    master::save(path, &merged)?;
    Ok(StepOutcome::ok(format!(
        "appended {} rows to {} ({} total)",
        incoming.height(),
        path.display(),
        merged.height()
    )))
}

fn run_clean(settings: &BacklogConfig, ctx: &RunContext, dry_run: bool) -> capacity::Result<StepOutcome> {
    let Some(input) = settings.input_csv.as_deref() else {
        return Ok(StepOutcome::skipped("backlog.input_csv not set"));
    };
    if !input.exists() {
        return Ok(StepOutcome::skipped(format!("{} not found", input.display())));
    }
    let raw = workbook::read_export(
        input,
        ExportOptions {
            strip_tree_markers: true,
        },
    )?;
    if raw.is_empty() {
        return Ok(StepOutcome::skipped("no data read from the export"));
    }
    let cleaned = clean_backlog(raw, settings, ctx.timestamp);
    if dry_run {
        return Ok(StepOutcome::ok(format!("{} rows (dry run)", cleaned.height())));
    }
    append_history(&settings.output_excel, &cleaned)
}

// =============================================================================
// Weekly Aggregation
// =============================================================================

/// `HH:MM` as minutes; anything else counts as zero.
fn to_minutes(value: &str) -> u32 {
    HOURS_MINUTES
        .captures(value)
        .and_then(|c| Some(c[1].parse::<u32>().ok()? * 60 + c[2].parse::<u32>().ok()?))
        .unwrap_or(0)
}

fn format_minutes(total: u32) -> String {
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Sums this week's remaining load per comment. `None` when the history
/// lacks the needed columns or has no rows for the week.
fn weekly_totals(history: &Table, now: NaiveDateTime) -> Option<BTreeMap<String, u32>> {
    let comment = history.column_index(COMMENT)?;
    let load = history.column_index(REMAINING_LOAD)?;
    let date = history.column_index(columns::DATE)?;
    let week = now.date().iso_week();

    let mut totals: BTreeMap<String, u32> = BTreeMap::new();
    let mut matched = 0;
    for row in history.rows() {
        let Some(dt) = row[date].as_datetime() else {
            continue;
        };
        if dt.date().iso_week() != week {
            continue;
        }
        matched += 1;
        let Some(name) = row[comment].as_text() else {
            continue;
        };
        *totals.entry(name.trim().to_string()).or_default() += to_minutes(&row[load].to_string());
    }
    (matched > 0).then_some(totals)
}

/// One weekly row: `KW`, `Timestamp`, then one `HH:MM` column per comment.
fn weekly_row(totals: &BTreeMap<String, u32>, ctx: &RunContext) -> Table {
    let week = ctx.started_at.date().iso_week().week();
    let mut header = vec!["KW".to_string(), "Timestamp".to_string()];
    let mut row = vec![Cell::text(format!("KW{:02}", week)), Cell::DateTime(ctx.timestamp)];
    for (name, minutes) in totals {
        header.push(name.clone());
        row.push(Cell::text(format_minutes(*minutes)));
    }
    let mut table = Table::new(header);
    table.push_row(row);
    table
}

fn run_weekly(settings: &BacklogConfig, ctx: &RunContext, dry_run: bool) -> capacity::Result<StepOutcome> {
    if !settings.output_excel.exists() {
        return Ok(StepOutcome::skipped(format!(
            "{} not found",
            settings.output_excel.display()
        )));
    }
    let history = master::load(&settings.output_excel)?;
    let Some(totals) = weekly_totals(&history, ctx.started_at) else {
        return Ok(StepOutcome::skipped(format!(
            "no data for KW{:02}",
            ctx.started_at.date().iso_week().week()
        )));
    };
    let row = weekly_row(&totals, ctx);
    if dry_run {
        return Ok(StepOutcome::ok(format!("{} comments (dry run)", totals.len())));
    }
    let summary = master::append_file(&settings.weekly_output, &row, &[])?;
    Ok(StepOutcome::ok(format!("{} comments; {}", totals.len(), summary)))
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
    let mut report = RunReport::new("backlog", &ctx);

    println!("=== Production Backlog ===");
    println!("Run: {}", ctx.run_id);
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });
    log::info!("Production backlog processing started");

    report.record("clean", run_clean(&config.backlog, &ctx, args.dry_run));
    if args.skip_weekly {
        report.record("weekly", StepOutcome::skipped("--skip-weekly"));
    } else {
        report.record("weekly", run_weekly(&config.backlog, &ctx, args.dry_run));
    }

    println!("\n=== Run Summary ===");
    print!("{}", report.summary());
    if !args.dry_run {
        let path = report
            .write_json(&config.report_dir())
            .context("Failed to write run report")?;
        println!("Report: {}", path.display());
    }
    log::info!("Production backlog processing completed");
    Ok(())
}
