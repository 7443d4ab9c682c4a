//! First pass: gather per-project usage reports into one corpus report.

use crate::catalogue::{SourceLocation, TestDescriptor};
use crate::errors::{HarnessError, Result};
use crate::types::Platform;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// File the profiler writes into each statistics working directory.
pub const USAGE_REPORT_FILE: &str = "APIstatistics.csv";
/// Marker the profiler prints when some imports could not be resolved.
pub const PERMISSIVE_MARKER: &str = "CSV generated in permissive mode!";
/// Section header that starts each project in the merged report.
pub const PROJECT_HEADER: &str = "# Applet: ";

/// What a project contributed to the statistics run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportContent {
    Report(String),
    Disabled(Platform),
    Missing,
}

/// One project's entry in the merged report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReport {
    pub name: String,
    pub source: SourceLocation,
    pub path: PathBuf,
    pub content: ReportContent,
}

impl ProjectReport {
    pub fn new(descriptor: &TestDescriptor, content: ReportContent) -> Self {
        Self {
            name: descriptor.name.clone(),
            source: descriptor.source.clone(),
            path: descriptor.path.clone(),
            content,
        }
    }

    /// Report was produced with an incomplete classpath.
    pub fn is_incomplete(&self) -> bool {
        matches!(&self.content, ReportContent::Report(text) if text.contains(PERMISSIVE_MARKER))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub projects: usize,
    pub disabled: usize,
    pub incomplete: Vec<String>,
    pub missing: Vec<String>,
}

/// Find the usage report of `descriptor` under `stats_dir`.
///
/// Statistics working directories are named `<slug>_stats_<random>`, where
/// the random part never contains `_`. When a rerun left several behind, the
/// most recently written report wins; equal times fall back to the name.
pub fn find_report(stats_dir: &Path, descriptor: &TestDescriptor) -> Result<Option<PathBuf>> {
    let prefix = format!("{}_stats_", descriptor.slug());
    let entries = match fs::read_dir(stats_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(suffix) = name.to_string_lossy().strip_prefix(&prefix).map(str::to_owned) else {
            continue;
        };
        if suffix.is_empty() || suffix.contains('_') {
            continue;
        }
        let report = entry.path().join(USAGE_REPORT_FILE);
        let Ok(meta) = fs::metadata(&report) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified()?;
        let candidate = (modified, report);
        if newest.as_ref().is_none_or(|best| candidate > *best) {
            newest = Some(candidate);
        }
    }
    Ok(newest.map(|(_, report)| report))
}

/// Collect one entry per descriptor, in catalogue order.
pub fn collect_reports<'a>(
    descriptors: impl IntoIterator<Item = &'a TestDescriptor>,
    stats_dir: &Path,
    platform: Platform,
) -> Result<Vec<ProjectReport>> {
    let mut reports = Vec::new();
    for descriptor in descriptors {
        if !descriptor.platforms.enabled_on(platform) {
            reports.push(ProjectReport::new(descriptor, ReportContent::Disabled(platform)));
            continue;
        }
        let content = match find_report(stats_dir, descriptor)? {
            Some(path) => {
                debug!(test = %descriptor.name, report = %path.display(), "Collected usage report");
                let text = fs::read_to_string(&path).map_err(|err| HarnessError::Report {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
                ReportContent::Report(text)
            }
            None => {
                warn!(test = %descriptor.name, dir = %stats_dir.display(), "No usage report found");
                ReportContent::Missing
            }
        };
        reports.push(ProjectReport::new(descriptor, content));
    }
    Ok(reports)
}

/// Render the merged corpus report.
pub fn merge_reports(reports: &[ProjectReport]) -> (String, MergeSummary) {
    let mut merged = String::new();
    let mut summary = MergeSummary::default();

    for report in reports {
        summary.projects += 1;
        let source = match &report.source {
            SourceLocation::Repo(url) => format!("# Repo: {url}"),
            SourceLocation::Archive(url) => format!("# Archive: {url}"),
        };
        // Infallible: writing into a String.
        let _ = writeln!(merged, "{PROJECT_HEADER}{}", report.name);
        let _ = writeln!(merged, "{source}");
        let _ = writeln!(merged, "# Path: {}", report.path.display());
        merged.push('\n');

        match &report.content {
            ReportContent::Report(text) => {
                if report.is_incomplete() {
                    summary.incomplete.push(report.name.clone());
                }
                merged.push_str(text);
                if !text.ends_with('\n') {
                    merged.push('\n');
                }
            }
            ReportContent::Disabled(platform) => {
                summary.disabled += 1;
                let _ = writeln!(merged, "disabled on {platform}");
            }
            ReportContent::Missing => {
                summary.missing.push(report.name.clone());
                merged.push_str("# No usage report was produced\n");
            }
        }
        merged.push('\n');
    }

    (merged, summary)
}
