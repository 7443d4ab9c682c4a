//! Error catalog and definitions for the Applet Profiling Harness
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                              |
//! |------------|-------------|------------------------------------------|
//! | E001-E099  | Config      | Catalogue, run configuration, settings   |
//! | E100-E199  | Fixture     | Source tree acquisition and edits        |
//! | E200-E299  | Execution   | Working directories and tool invocation  |
//! | E300-E399  | Statistics  | Usage report merging and counting        |
//! | E500-E599  | Internal    | Internal/unexpected errors               |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::types::{RunMode, Stage};
use crate::version::ToolkitVersion;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the harness library can surface.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to read catalogue {path}: {source}")]
    CatalogueRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalogue {path}: {message}")]
    CatalogueParse { path: PathBuf, message: String },

    #[error("invalid descriptor `{name}`: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("no tests match the {filter:?} filter")]
    EmptyFilter { filter: Vec<String> },

    #[error("minimum tool-kit version {min} is newer than maximum {max}")]
    VersionBounds {
        min: ToolkitVersion,
        max: ToolkitVersion,
    },

    #[error("{mode} mode cannot be used on a physical card")]
    IncompatibleMode { mode: RunMode },

    #[error("repeat count must be at least 1 (-n/--repeat-count), got {0}")]
    RepeatCount(u32),

    #[error("invalid harness settings {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    #[error("invalid environment: {0}")]
    Env(String),

    #[error("failed to clone {repo}: {message}")]
    Clone { repo: String, message: String },

    #[error("failed to fetch archive {url}: {message}")]
    Download { url: String, message: String },

    #[error("failed to apply source edit for `{name}`: {message}")]
    Edit { name: String, message: String },

    #[error("auxiliary jar not found: {0}")]
    MissingJar(PathBuf),

    #[error("failed to prepare working directory {path}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{unit} failed at stage {stage} with exit code {code}")]
    StageFailed {
        unit: String,
        stage: StageLabel,
        code: i32,
    },

    #[error("JDK probe failed: {0}")]
    Probe(String),

    #[error("failed to read symbol manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed usage report {path}: {message}")]
    Report { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stage as shown in failure messages; `all` stands for an unbounded pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLabel {
    Bounded(Stage),
    All,
}

impl std::fmt::Display for StageLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded(stage) => write!(f, "{stage}"),
            Self::All => f.write_str("all"),
        }
    }
}

impl HarnessError {
    /// Catalog code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CatalogueRead { .. } => ErrorCode::CatalogueReadError,
            Self::CatalogueParse { .. } => ErrorCode::CatalogueParseError,
            Self::InvalidDescriptor { .. } => ErrorCode::CatalogueInvalidDescriptor,
            Self::EmptyFilter { .. } => ErrorCode::CatalogueEmptyFilter,
            Self::VersionBounds { .. } => ErrorCode::ConfigVersionBounds,
            Self::IncompatibleMode { .. } => ErrorCode::ConfigIncompatibleMode,
            Self::ConfigFile { .. } => ErrorCode::ConfigFileError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
            Self::RepeatCount(_) => ErrorCode::ConfigRepeatCount,
            Self::Clone { .. } => ErrorCode::FixtureCloneFailed,
            Self::Download { .. } => ErrorCode::FixtureDownloadFailed,
            Self::Edit { .. } => ErrorCode::FixtureEditFailed,
            Self::MissingJar(_) => ErrorCode::FixtureMissingJar,
            Self::Workdir { .. } => ErrorCode::ExecWorkdirError,
            Self::Spawn { .. } => ErrorCode::ExecSpawnFailed,
            Self::StageFailed { .. } => ErrorCode::ExecStageFailed,
            Self::Probe(_) => ErrorCode::ExecProbeFailed,
            Self::Manifest { .. } => ErrorCode::StatsManifestError,
            Self::Report { .. } => ErrorCode::StatsReportError,
            Self::Io(_) => ErrorCode::InternalIo,
        }
    }

    /// True for errors raised before any execution unit runs.
    pub fn is_configuration(&self) -> bool {
        self.code().category() == ErrorCategory::Config
    }
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        let err = HarnessError::EmptyFilter {
            filter: vec!["nope".to_string()],
        };
        assert!(err.is_configuration());
        assert_eq!(err.code(), ErrorCode::CatalogueEmptyFilter);

        let err = HarnessError::StageFailed {
            unit: "x".to_string(),
            stage: StageLabel::Bounded(Stage::Profiling),
            code: 1,
        };
        assert!(!err.is_configuration());
        assert_eq!(
            err.to_string(),
            "x failed at stage profiling with exit code 1"
        );
    }

    #[test]
    fn test_stage_label_display() {
        assert_eq!(StageLabel::All.to_string(), "all");
        assert_eq!(
            StageLabel::Bounded(Stage::Compilation).to_string(),
            "compilation"
        );
    }
}
