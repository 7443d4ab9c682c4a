//! Symbol-usage aggregation over statistics-mode runs.
//!
//! Three passes:
//!
//! 1. [`merge`]: every project's usage report goes into one `stats.txt`,
//!    each under an `# Applet:` header.
//! 2. [`tally`]: per symbol, the number of distinct projects using it.
//! 3. [`manifest`]: one table per known-library manifest; each listed symbol
//!    is taken out of the counts, and the remainder is written as
//!    `thirdparty.txt`.

pub mod key;
pub mod manifest;
pub mod merge;
pub mod tally;

pub use key::SymbolKey;
pub use manifest::{Manifest, ManifestKind, render_third_party};
pub use merge::{MergeSummary, ProjectReport, ReportContent, collect_reports, merge_reports};
pub use tally::SymbolCounts;

use crate::errors::{HarnessError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MERGED_REPORT_FILE: &str = "stats.txt";
pub const THIRD_PARTY_FILE: &str = "thirdparty.txt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub manifest: String,
    pub listed: usize,
    pub used: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateSummary {
    pub merge: MergeSummary,
    /// Distinct symbols seen across all projects.
    pub symbols: usize,
    pub tables: Vec<TableSummary>,
    pub third_party: usize,
}

/// Read and parse `<manifests_dir>/<kind>-in.txt`.
pub fn load_manifest(manifests_dir: &Path, kind: ManifestKind) -> Result<Manifest> {
    let path = manifests_dir.join(kind.input_file());
    let text = fs::read_to_string(&path).map_err(|source| HarnessError::Manifest {
        path: path.clone(),
        source,
    })?;
    Manifest::parse(kind, &text).map_err(|err| HarnessError::Manifest {
        path,
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
    })
}

/// Run all three passes and write the tables into `output_dir`.
pub fn aggregate(
    reports: &[ProjectReport],
    manifests_dir: &Path,
    output_dir: &Path,
) -> Result<AggregateSummary> {
    let manifests = ManifestKind::ALL
        .iter()
        .map(|kind| load_manifest(manifests_dir, *kind))
        .collect::<Result<Vec<_>>>()?;

    fs::create_dir_all(output_dir)?;
    let (merged, merge) = merge_reports(reports);
    write_table(output_dir, MERGED_REPORT_FILE, &merged)?;
    info!(
        projects = merge.projects,
        incomplete = merge.incomplete.len(),
        missing = merge.missing.len(),
        "Merged usage reports"
    );
    for name in &merge.incomplete {
        warn!(test = %name, "Usage report generated with an incomplete classpath");
    }

    let mut counts = SymbolCounts::from_merged(&merged);
    let symbols = counts.len();

    let mut tables = Vec::with_capacity(manifests.len());
    for manifest in &manifests {
        let kind = manifest.kind();
        let (table, used) = manifest.render(&mut counts);
        write_table(output_dir, &kind.output_file(), &table)?;
        tables.push(TableSummary {
            manifest: kind.to_string(),
            listed: manifest.symbol_count(),
            used,
        });
    }

    write_table(output_dir, THIRD_PARTY_FILE, &render_third_party(&counts))?;
    info!(symbols, third_party = counts.len(), "Wrote usage tables");

    Ok(AggregateSummary {
        merge,
        symbols,
        tables,
        third_party: counts.len(),
    })
}

fn write_table(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|err| HarnessError::Report {
        path,
        message: err.to_string(),
    })
}

/// Move an existing statistics directory out of the way.
///
/// The old directory is renamed to a fresh `<name>_old_<random>` sibling;
/// returns where it went, or `None` if there was nothing to move.
pub fn rename_aside(stats_dir: &Path) -> Result<Option<PathBuf>> {
    if !stats_dir.exists() {
        return Ok(None);
    }
    let parent = match stats_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let name = stats_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stats".to_string());

    let workdir_err = |source| HarnessError::Workdir {
        path: stats_dir.to_path_buf(),
        source,
    };
    let target = tempfile::Builder::new()
        .prefix(&format!("{name}_old_"))
        .tempdir_in(&parent)
        .map_err(workdir_err)?
        .keep();
    // The placeholder only reserves a unique name.
    fs::remove_dir(&target).map_err(workdir_err)?;
    fs::rename(stats_dir, &target).map_err(workdir_err)?;
    info!(from = %stats_dir.display(), to = %target.display(), "Renamed previous statistics directory");
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_aside() {
        let dir = tempfile::tempdir().unwrap();
        let stats = dir.path().join("stats_out");
        assert_eq!(rename_aside(&stats).unwrap(), None);

        fs::create_dir_all(stats.join("x_stats_1")).unwrap();
        let moved = rename_aside(&stats).unwrap().unwrap();

        assert!(!stats.exists());
        assert!(moved.join("x_stats_1").is_dir());
        assert!(
            moved
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("stats_out_old_")
        );
    }

    #[test]
    fn test_missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = aggregate(&[], dir.path(), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, HarnessError::Manifest { ref path, .. } if path.ends_with("constants-in.txt")));
    }

    #[test]
    fn test_orphan_symbol_is_a_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("types-in.txt"), "APDU\n").unwrap();
        let err = load_manifest(dir.path(), ManifestKind::Types).unwrap_err();
        assert!(err.to_string().contains("precedes any section header"));
    }
}
