//! End-of-run report: one outcome per pipeline step.

use crate::context::RunContext;
use crate::error::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Ok { detail: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl StepOutcome {
    pub fn ok(detail: impl Into<String>) -> Self {
        StepOutcome::Ok {
            detail: detail.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        StepOutcome::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Ok { .. } => "ok",
            StepOutcome::Skipped { .. } => "skipped",
            StepOutcome::Failed { .. } => "failed",
        }
    }

    fn message(&self) -> &str {
        match self {
            StepOutcome::Ok { detail } => detail,
            StepOutcome::Skipped { reason } => reason,
            StepOutcome::Failed { error } => error,
        }
    }
}

impl<E: std::fmt::Display> From<std::result::Result<StepOutcome, E>> for StepOutcome {
    fn from(result: std::result::Result<StepOutcome, E>) -> Self {
        result.unwrap_or_else(|e| StepOutcome::Failed {
            error: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub job: String,
    pub run_id: Uuid,
    pub started_at: NaiveDateTime,
    pub timestamp: NaiveDateTime,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn new(job: &str, ctx: &RunContext) -> Self {
        RunReport {
            job: job.to_string(),
            run_id: ctx.run_id,
            started_at: ctx.started_at,
            timestamp: ctx.timestamp,
            steps: Vec::new(),
        }
    }

    /// Records a step and logs it at the level matching its outcome.
    pub fn record(&mut self, step: impl Into<String>, outcome: impl Into<StepOutcome>) {
        let step = step.into();
        let outcome = outcome.into();
        match &outcome {
            StepOutcome::Ok { detail } => log::info!("[{}] ok: {}", step, detail),
            StepOutcome::Skipped { reason } => log::warn!("[{}] skipped: {}", step, reason),
            StepOutcome::Failed { error } => log::error!("[{}] failed: {}", step, error),
        }
        self.steps.push(StepReport { step, outcome });
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.step == step)
            .map(|s| &s.outcome)
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for s in &self.steps {
            match s.outcome {
                StepOutcome::Ok { .. } => counts.ok += 1,
                StepOutcome::Skipped { .. } => counts.skipped += 1,
                StepOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.outcome.is_failed())
    }

    /// Human-readable summary for stdout.
    pub fn summary(&self) -> String {
        let counts = self.counts();
        let mut out = format!(
            "Run {} ({}): {} ok, {} skipped, {} failed\n",
            self.run_id,
            self.job,
            counts.ok,
            counts.skipped,
            counts.failed
        );
        for s in &self.steps {
            out.push_str(&format!(
                "  [{:7}] {} - {}\n",
                s.outcome.label(),
                s.step,
                s.outcome.message()
            ));
        }
        out
    }

    /// Writes `run-<run_id>.json` into `dir`.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("run-{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
