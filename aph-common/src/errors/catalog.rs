//! Error Catalog for the Applet Profiling Harness
//!
//! Every [`HarnessError`](super::HarnessError) maps onto one entry of this
//! catalog. Each entry carries:
//! - A unique code (APH-E001 through APH-E599)
//! - A short human-readable message
//! - Remediation steps
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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all harness error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Catalogue file could not be read
    CatalogueReadError,
    /// Catalogue file is not valid JSON/TOML
    CatalogueParseError,
    /// A descriptor violates a structural invariant
    CatalogueInvalidDescriptor,
    /// The name filter matched no descriptor
    CatalogueEmptyFilter,
    /// Minimum and maximum tool-kit bounds contradict each other
    ConfigVersionBounds,
    /// Requested run mode cannot be used with the execution target
    ConfigIncompatibleMode,
    /// Harness settings file could not be read or parsed
    ConfigFileError,
    /// Environment variable has an invalid value
    ConfigEnvError,
    /// Repeat count is zero
    ConfigRepeatCount,

    // =========================================================================
    // Fixture Errors (E100-E199)
    // =========================================================================
    /// Cloning a source repository failed
    FixtureCloneFailed,
    /// Downloading or unpacking an archive failed
    FixtureDownloadFailed,
    /// A declared source edit could not be applied
    FixtureEditFailed,
    /// An auxiliary API jar is missing
    FixtureMissingJar,

    // =========================================================================
    // Execution Errors (E200-E299)
    // =========================================================================
    /// Working directory could not be created or populated
    ExecWorkdirError,
    /// The profiler process could not be started
    ExecSpawnFailed,
    /// A stage returned a non-zero exit status under the strict policy
    ExecStageFailed,
    /// Tool-kit probing failed
    ExecProbeFailed,

    // =========================================================================
    // Statistics Errors (E300-E399)
    // =========================================================================
    /// A symbol manifest could not be read
    StatsManifestError,
    /// A usage report is malformed
    StatsReportError,

    // =========================================================================
    // Internal Errors (E500-E599)
    // =========================================================================
    /// Unexpected I/O failure
    InternalIo,
}

/// Subsystem an error code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Fixture,
    Execution,
    Statistics,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Fixture => "fixture",
            Self::Execution => "execution",
            Self::Statistics => "statistics",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Full catalog entry for an error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub code: &'static str,
    pub category: ErrorCategory,
    pub message: &'static str,
    pub remediation: &'static [&'static str],
}

impl ErrorCode {
    /// Numeric part of the code, unique across the catalog.
    pub fn number(self) -> u16 {
        match self {
            Self::CatalogueReadError => 1,
            Self::CatalogueParseError => 2,
            Self::CatalogueInvalidDescriptor => 3,
            Self::CatalogueEmptyFilter => 4,
            Self::ConfigVersionBounds => 5,
            Self::ConfigIncompatibleMode => 6,
            Self::ConfigFileError => 7,
            Self::ConfigEnvError => 8,
            Self::ConfigRepeatCount => 9,
            Self::FixtureCloneFailed => 100,
            Self::FixtureDownloadFailed => 101,
            Self::FixtureEditFailed => 102,
            Self::FixtureMissingJar => 103,
            Self::ExecWorkdirError => 200,
            Self::ExecSpawnFailed => 201,
            Self::ExecStageFailed => 202,
            Self::ExecProbeFailed => 203,
            Self::StatsManifestError => 300,
            Self::StatsReportError => 301,
            Self::InternalIo => 500,
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self.number() {
            0..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Fixture,
            200..=299 => ErrorCategory::Execution,
            300..=399 => ErrorCategory::Statistics,
            _ => ErrorCategory::Internal,
        }
    }

    /// Look up the catalog entry for this code.
    pub fn entry(self) -> ErrorEntry {
        let (code, message, remediation): (&'static str, &'static str, &'static [&'static str]) =
            match self {
                Self::CatalogueReadError => (
                    "APH-E001",
                    "Catalogue file could not be read",
                    &["Check the --catalogue path or `catalogue` in aph.toml"],
                ),
                Self::CatalogueParseError => (
                    "APH-E002",
                    "Catalogue file is malformed",
                    &["Validate the file as JSON (or TOML for .toml catalogues)"],
                ),
                Self::CatalogueInvalidDescriptor => (
                    "APH-E003",
                    "Test descriptor is invalid",
                    &[
                        "Each descriptor needs exactly one of `repo`/`archive`",
                        "Use either `subtests` or `entryPoints`, never both",
                        "Each subtest needs exactly one of `input`/`inputFile`",
                    ],
                ),
                Self::CatalogueEmptyFilter => (
                    "APH-E004",
                    "No test matches the name filter",
                    &["Filters are case-insensitive substrings of descriptor names"],
                ),
                Self::ConfigVersionBounds => (
                    "APH-E005",
                    "Tool-kit version bounds are incompatible",
                    &[
                        "Lower --min-toolkit or raise --max-toolkit",
                        "The JDK probe may raise the minimum; pass --no-jdk-probe to disable it",
                    ],
                ),
                Self::ConfigIncompatibleMode => (
                    "APH-E006",
                    "Run mode is not available for this execution target",
                    &["Statistics are gathered without a card; drop --card"],
                ),
                Self::ConfigFileError => (
                    "APH-E007",
                    "Harness settings file is invalid",
                    &["Check the TOML syntax of aph.toml"],
                ),
                Self::ConfigEnvError => (
                    "APH-E008",
                    "Environment variable has an invalid value",
                    &["Unset or correct the reported APH_* variable"],
                ),
                Self::ConfigRepeatCount => (
                    "APH-E009",
                    "Repeat count is out of range",
                    &["Pass -n/--repeat-count with a value of 1 or more"],
                ),
                Self::FixtureCloneFailed => (
                    "APH-E100",
                    "Source repository could not be cloned",
                    &["Check network access and the repository URL", "Ensure git is on PATH"],
                ),
                Self::FixtureDownloadFailed => (
                    "APH-E101",
                    "Source archive could not be fetched",
                    &["Check the archive URL", "Ensure tar is on PATH"],
                ),
                Self::FixtureEditFailed => (
                    "APH-E102",
                    "Source edit could not be applied",
                    &["Verify the move/remove/fixup paths against the fetched tree"],
                ),
                Self::FixtureMissingJar => (
                    "APH-E103",
                    "Auxiliary API jar not found",
                    &["Build or download the jar into the auxiliary directory"],
                ),
                Self::ExecWorkdirError => (
                    "APH-E200",
                    "Working directory could not be prepared",
                    &["Check free space and permissions of the output directory"],
                ),
                Self::ExecSpawnFailed => (
                    "APH-E201",
                    "Profiler process could not be started",
                    &["Check the java launcher and the profiler jar path"],
                ),
                Self::ExecStageFailed => (
                    "APH-E202",
                    "Profiler stage failed",
                    &["Inspect the working directory named in the log", "Rerun with --debug"],
                ),
                Self::ExecProbeFailed => (
                    "APH-E203",
                    "JDK version probe failed",
                    &["Ensure javac is on PATH or pass --no-jdk-probe"],
                ),
                Self::StatsManifestError => (
                    "APH-E300",
                    "Symbol manifest could not be read",
                    &["Provide constants-in.txt, types-in.txt and methods-in.txt"],
                ),
                Self::StatsReportError => (
                    "APH-E301",
                    "Usage report is malformed",
                    &["Regenerate statistics with `aph stats`"],
                ),
                Self::InternalIo => (
                    "APH-E500",
                    "Unexpected I/O error",
                    &["Rerun with -v for details"],
                ),
            };

        ErrorEntry {
            code,
            category: self.category(),
            message,
            remediation,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "APH-E{:03}", self.number())
    }
}
