//! YAML configuration shared by the planning jobs.
//!
//! Every section has defaults, so a job only needs the keys it reads.

use crate::error::{PlanningError, Result};
use crate::region::RegionSpec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file used when neither `--config` nor `$PLANNING_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

// =============================================================================
// Config Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Where run reports go; `<output_dir>/reports` when unset.
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
    #[serde(default)]
    pub execution: Execution,
    #[serde(default)]
    pub oee: OeeConfig,
    #[serde(default)]
    pub retention: Retention,
    #[serde(default)]
    pub data_extraction: DataExtraction,
    #[serde(default)]
    pub combined_total_production_hours: CadencePaths,
    #[serde(default)]
    pub backlog: BacklogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Execution {
    #[serde(default = "default_true")]
    pub use_rounded_timestamp: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OeeConfig {
    #[serde(default = "default_oee")]
    pub default: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retention {
    #[serde(default = "default_months_to_keep")]
    pub months_to_keep: u32,
    #[serde(default = "default_date_column")]
    pub date_column: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CadencePaths {
    #[serde(default)]
    pub monthly: Option<PathBuf>,
    #[serde(default)]
    pub weekly: Option<PathBuf>,
}

impl CadencePaths {
    /// `(cadence, path)` for every configured cadence.
    pub fn entries(&self) -> Vec<(&'static str, &Path)> {
        let mut out = Vec::new();
        if let Some(p) = &self.monthly {
            out.push(("monthly", p.as_path()));
        }
        if let Some(p) = &self.weekly {
            out.push(("weekly", p.as_path()));
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataExtraction {
    #[serde(default)]
    pub input_file_path: Option<PathBuf>,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// Overrides the built-in region layout when present.
    #[serde(default)]
    pub regions: Option<Vec<RegionSpec>>,
    /// Export files per production area (`PB1` … `PB4`).
    #[serde(default)]
    pub pb_input_files: BTreeMap<String, CadencePaths>,
    #[serde(default)]
    pub smt_input_files: CadencePaths,
    /// SMT load exports keyed `12months` / `5quarters`.
    #[serde(default)]
    pub smt_load_files: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacklogConfig {
    #[serde(default)]
    pub input_csv: Option<PathBuf>,
    #[serde(default = "default_backlog_output")]
    pub output_excel: PathBuf,
    #[serde(default = "default_backlog_weekly")]
    pub weekly_output: PathBuf,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Columns added (empty) when the export lacks them.
    #[serde(default)]
    pub extra_columns: Vec<String>,
}

// ── Defaults ──

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_oee() -> f64 {
    0.807
}

fn default_months_to_keep() -> u32 {
    8
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_sheet_name() -> String {
    "Tabelle1".to_string()
}

fn default_backlog_output() -> PathBuf {
    PathBuf::from("output/backlog_history.xlsx")
}

fn default_backlog_weekly() -> PathBuf {
    PathBuf::from("output/backlog_weekly.xlsx")
}

impl Default for Execution {
    fn default() -> Self {
        Execution {
            use_rounded_timestamp: true,
        }
    }
}

impl Default for OeeConfig {
    fn default() -> Self {
        OeeConfig {
            default: default_oee(),
        }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Retention {
            months_to_keep: default_months_to_keep(),
            date_column: default_date_column(),
        }
    }
}

impl Default for DataExtraction {
    fn default() -> Self {
        DataExtraction {
            input_file_path: None,
            sheet_name: default_sheet_name(),
            regions: None,
            pb_input_files: BTreeMap::new(),
            smt_input_files: CadencePaths::default(),
            smt_load_files: BTreeMap::new(),
        }
    }
}

impl Default for BacklogConfig {
    fn default() -> Self {
        BacklogConfig {
            input_csv: None,
            output_excel: default_backlog_output(),
            weekly_output: default_backlog_weekly(),
            drop_columns: Vec::new(),
            extra_columns: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlanningError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("reports"))
    }

    /// Path of a file in the output directory.
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

/// Picks the config path: explicit argument, then `$PLANNING_CONFIG`, then
/// [`DEFAULT_CONFIG_PATH`].
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PLANNING_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.execution.use_rounded_timestamp);
        assert_eq!(config.oee.default, 0.807);
        assert_eq!(config.retention.months_to_keep, 8);
        assert_eq!(config.retention.date_column, "Date");
        assert!(config.data_extraction.regions.is_none());
        assert_eq!(config.report_dir(), PathBuf::from("output/reports"));
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
output_dir: out
log_file: logs/script.log
execution:
  use_rounded_timestamp: false
retention:
  months_to_keep: 3
data_extraction:
  input_file_path: data/Kapazitaet.xlsx
  sheet_name: Planung
  regions:
    - name: SMT_OEE
      skip: 13
      count: 2
      columns: T
  pb_input_files:
    PB1:
      monthly: data/pb1_monthly.csv
      weekly: data/pb1_weekly.csv
    PB2:
      monthly: data/pb2_monthly.csv
  smt_input_files:
    weekly: data/smt_weekly.csv
  smt_load_files:
    12months: data/smt_load_12.csv
    5quarters: data/smt_load_5q.csv
combined_total_production_hours:
  monthly: out/combined_monthly_production_hours.xlsx
backlog:
  input_csv: data/backlog.csv
  drop_columns: [Werk, Lager]
  extra_columns: [Standort]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.log_file, Some(PathBuf::from("logs/script.log")));
        assert!(!config.execution.use_rounded_timestamp);
        assert_eq!(config.retention.months_to_keep, 3);
        assert_eq!(config.retention.date_column, "Date");

        let ex = &config.data_extraction;
        assert_eq!(ex.sheet_name, "Planung");
        assert_eq!(ex.regions.as_ref().map(Vec::len), Some(1));
        assert_eq!(ex.pb_input_files["PB1"].entries().len(), 2);
        assert_eq!(ex.pb_input_files["PB2"].entries(), vec![("monthly", Path::new("data/pb2_monthly.csv"))]);
        assert_eq!(ex.smt_input_files.entries()[0].0, "weekly");
        assert_eq!(ex.smt_load_files["12months"], PathBuf::from("data/smt_load_12.csv"));
        assert_eq!(ex.smt_load_files.len(), 2);

        assert_eq!(config.combined_total_production_hours.entries().len(), 1);
        assert_eq!(config.backlog.drop_columns, vec!["Werk", "Lager"]);
        assert_eq!(config.backlog.extra_columns, vec!["Standort"]);
        assert_eq!(config.output_file("x.xlsx"), PathBuf::from("out/x.xlsx"));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, PlanningError::Config(_)));
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let p = resolve_path(Some(Path::new("custom.yaml")));
        assert_eq!(p, PathBuf::from("custom.yaml"));
    }
}
