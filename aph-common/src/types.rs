//! Common types used across harness components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One phase of the profiler pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Instrumentation,
    Compilation,
    Installation,
    Profiling,
    Visualisation,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::Instrumentation,
        Stage::Compilation,
        Stage::Installation,
        Stage::Profiling,
        Stage::Visualisation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instrumentation => "instrumentation",
            Self::Compilation => "compilation",
            Self::Installation => "installation",
            Self::Profiling => "profiling",
            Self::Visualisation => "visualisation",
        }
    }

    /// Stages from the first one up to and including `last`.
    pub fn up_to(last: Stage) -> Vec<Stage> {
        Self::ALL.into_iter().filter(|stage| *stage <= last).collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// What the profiler measures for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Memory,
    Time,
    Stats,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Time => "time",
            Self::Stats => "stats",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the profiled applet executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTarget {
    /// Disposable simulator; failures are fatal.
    #[default]
    Simulator,
    /// Physical card; failures are recorded and the run continues.
    Device,
}

/// How a stage failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failed stage.
    Strict,
    /// Record the failure, abandon the unit, continue with the next one.
    Tolerant,
}

impl ExecutionTarget {
    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            Self::Simulator => FailurePolicy::Strict,
            Self::Device => FailurePolicy::Tolerant,
        }
    }
}

/// Host operating system, as named in per-platform descriptor flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Linux,
    Windows,
    Darwin,
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Darwin
        } else {
            Self::Linux
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Darwin => "Darwin",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_up_to_is_inclusive() {
        assert_eq!(
            Stage::up_to(Stage::Compilation),
            vec![Stage::Instrumentation, Stage::Compilation]
        );
        assert_eq!(Stage::up_to(Stage::Visualisation).len(), 5);
        assert_eq!(Stage::up_to(Stage::Instrumentation), vec![Stage::Instrumentation]);
    }

    #[test]
    fn test_stage_parse_roundtrip() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>(), Ok(stage));
        }
        assert!("all".parse::<Stage>().is_err());
    }

    #[test]
    fn test_failure_policy_follows_target() {
        assert_eq!(
            ExecutionTarget::Simulator.failure_policy(),
            FailurePolicy::Strict
        );
        assert_eq!(ExecutionTarget::Device.failure_policy(), FailurePolicy::Tolerant);
    }

    #[test]
    fn test_stage_serde_lowercase() {
        let stage: Stage = serde_json::from_str("\"profiling\"").unwrap();
        assert_eq!(stage, Stage::Profiling);
    }
}
