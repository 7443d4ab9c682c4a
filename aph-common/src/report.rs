//! Run report: skips and failures accumulated over one run.

use crate::eligibility::SkipReason;
use crate::errors::{HarnessError, Result, StageLabel};
use crate::plan::ExecutionUnit;
use crate::run_config::RunConfig;
use crate::types::{ExecutionTarget, FailurePolicy, RunMode};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;

pub const RUN_REPORT_SCHEMA_VERSION: &str = "1.0.0";
/// File name of the serialised report inside the output directory.
pub const RUN_REPORT_FILE: &str = "run-report.json";

/// A descriptor or entry point that was not compiled into units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEntry {
    pub test: String,
    pub entry_point: Option<String>,
    pub reason: SkipReason,
}

impl SkipEntry {
    pub fn new(test: &str, entry_point: Option<&str>, reason: SkipReason) -> Self {
        Self {
            test: test.to_string(),
            entry_point: entry_point.map(str::to_string),
            reason,
        }
    }
}

impl fmt::Display for SkipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.test)?;
        if let Some(ep) = &self.entry_point {
            write!(f, " {ep}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// A unit whose stage returned a non-zero exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub test: String,
    pub entry_point: Option<String>,
    /// Unit label, e.g. `Wallet credit in time mode`.
    pub unit: String,
    pub mode: RunMode,
    #[serde(serialize_with = "serialize_display")]
    pub stage: StageLabel,
    pub exit_code: i32,
    pub failed_at: DateTime<Utc>,
}

impl FailureEntry {
    pub fn new(unit: &ExecutionUnit<'_>, stage: StageLabel, exit_code: i32) -> Self {
        Self {
            test: unit.descriptor.name.clone(),
            entry_point: unit.entry_point.map(|ep| ep.name.clone()),
            unit: unit.label(),
            mode: unit.mode,
            stage,
            exit_code,
            failed_at: Utc::now(),
        }
    }

    pub fn to_error(&self) -> HarnessError {
        HarnessError::StageFailed {
            unit: self.unit.clone(),
            stage: self.stage,
            code: self.exit_code,
        }
    }
}

impl fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (stage {}, exit code {})",
            self.unit, self.stage, self.exit_code
        )
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Process-wide accumulator, owned by the execution engine for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema_version: String,
    pub mode: RunMode,
    pub target: ExecutionTarget,
    pub policy: FailurePolicy,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub skips: Vec<SkipEntry>,
    pub failures: Vec<FailureEntry>,
    pub units_attempted: usize,
    pub units_succeeded: usize,
    /// Set when a strict-policy failure stopped the run.
    pub aborted: bool,
}

impl RunReport {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION.to_string(),
            mode: config.mode,
            target: config.target,
            policy: config.failure_policy(),
            started_at: Utc::now(),
            finished_at: None,
            skips: Vec::new(),
            failures: Vec::new(),
            units_attempted: 0,
            units_succeeded: 0,
            aborted: false,
        }
    }

    pub fn record_skip(&mut self, skip: SkipEntry) {
        self.skips.push(skip);
    }

    pub fn extend_skips(&mut self, skips: impl IntoIterator<Item = SkipEntry>) {
        self.skips.extend(skips);
    }

    pub fn record_failure(&mut self, failure: FailureEntry) {
        self.failures.push(failure);
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// True if a fatal condition was hit.
    pub fn is_fatal(&self) -> bool {
        self.aborted
    }

    /// Process exit status: recorded failures alone never make it non-zero.
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() { 1 } else { 0 }
    }

    /// The failure that stopped a strict run, as an error.
    pub fn fatal_error(&self) -> Option<HarnessError> {
        if !self.aborted {
            return None;
        }
        self.failures.last().map(FailureEntry::to_error)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| HarnessError::Io(err.into()))
    }

    /// Write the report as JSON into `output_dir`.
    pub fn write_to(&self, output_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(output_dir)?;
        std::fs::write(output_dir.join(RUN_REPORT_FILE), self.to_json()?)?;
        Ok(())
    }
}
