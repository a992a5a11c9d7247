//! Column names, attribute names and file names shared by every job.
//!
//! The master workbooks are read by downstream reports, so these strings are
//! part of the on-disk format and must not drift.

// ── Long-format columns ──
pub mod columns {
    pub const PB_TYPE: &str = "PB Type";
    pub const SMT_TYPE: &str = "SMT Type";
    /// Spelling matches the existing PB master files.
    pub const CUSTOMER_TYPE: &str = "Coustmer Type";
    pub const PERIOD: &str = "Period";
    pub const VALUE: &str = "Value";
    pub const ATTRIBUTE: &str = "Attribute";
    pub const DATE: &str = "Date";
    pub const MONTH: &str = "Month";
    pub const WEEK: &str = "Week";
    pub const QUARTER: &str = "Quarter";
    pub const FREQUENCY: &str = "Frequency";

    /// Header of the PB/SMT workplace column in raw exports.
    pub const WORKPLACE: &str = "Arbeitsplatznummer";

    /// Lookup columns of the personal factor region.
    pub const PERSONAL_FACTOR: &str = "Personal\nFactor";
    pub const RESULT: &str = "Result";
}

// ── Attributes ──
pub mod attributes {
    pub const PRODUCTION_HOURS: &str = "Production Hours";
    pub const WORKING_DAYS: &str = "Arbeitstage";
    pub const VACATION_QUOTA: &str = "Urlaubsquoten(Plan)";
    pub const SICKNESS_QUOTA: &str = "Krankheitsquoten(Plan)";
    pub const FLEXTIME: &str = "Gleitzeit(Plan)";
    pub const DISTRIBUTED_TIME: &str = "Verteilzeit(Plan)";
    pub const SHORT_TIME: &str = "Kurzarbeitstage(Plan)";
    pub const ACTUAL_HEADCOUNT: &str = "Mitarbeiter(IST)";

    pub const HEADCOUNT_REQUIREMENT: &str = "Mitarbeiterbedarf_Brutto(Plan)";
    pub const VARIANCE: &str = "Abweichung";
    pub const UTILIZATION: &str = "Utilization";
    pub const MAINTENANCE: &str = "Wartung";

    /// Quotas subtracted from availability, in percent.
    pub const AVAILABILITY_QUOTAS: [&str; 4] =
        [VACATION_QUOTA, SICKNESS_QUOTA, FLEXTIME, DISTRIBUTED_TIME];
}

// ── Entities ──
pub mod entities {
    pub const FLAGSHIP: &str = "PB1";
    pub const SMT_TOTAL: &str = "SMT Gesamt";
    pub const UNKNOWN: &str = "Unknown";
}

// ── Output files ──
pub mod files {
    pub const MASTER_MONTHLY: &str = "master_file_monthly.xlsx";
    pub const MASTER_WEEKLY: &str = "master_file_weekly.xlsx";
    pub const PB_MASTER_MONTHLY: &str = "pb_master_monthly.xlsx";
    pub const PB_MASTER_WEEKLY: &str = "pb_master_weekly.xlsx";
    pub const SMT_MASTER_MONTHLY: &str = "smt_master_monthly.xlsx";
    pub const SMT_MASTER_WEEKLY: &str = "smt_master_weekly.xlsx";
    pub const COMBINED_MONTHLY: &str = "combined_monthly_production_hours.xlsx";
    pub const COMBINED_WEEKLY: &str = "combined_weekly_production_hours.xlsx";
    pub const COMBINED_MONTHLY_DATED: &str = "save_combined_production_monthly_date.xlsx";
    pub const COMBINED_WEEKLY_DATED: &str = "save_combined_production_weekly_date.xlsx";
    pub const SMT_LOAD_12_MONTHS: &str = "smt_load_master_12months.xlsx";
    pub const SMT_LOAD_5_QUARTERS: &str = "smt_load_master_5quarters.xlsx";
}

/// Hours in one working day.
pub const HOURS_PER_DAY: f64 = 7.25;

/// Shifts per day on the flagship line.
pub const SHIFTS: f64 = 3.0;

/// Key order used to deduplicate long-format rows.
pub const LONG_KEYS: [&str; 4] = [
    columns::PB_TYPE,
    columns::PERIOD,
    columns::ATTRIBUTE,
    columns::DATE,
];
