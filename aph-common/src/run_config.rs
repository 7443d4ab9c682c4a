//! Process-wide run configuration, built once from the invocation surface.

use crate::errors::{HarnessError, Result};
use crate::types::{ExecutionTarget, FailurePolicy, Platform, RunMode};
use crate::version::ToolkitVersion;
use serde::Serialize;
use std::path::PathBuf;

/// Default number of profiling rounds per subtest.
pub const DEFAULT_REPEAT_COUNT: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub mode: RunMode,
    pub target: ExecutionTarget,
    /// Also run partially-working tests, and subtests after the memory constructor check.
    pub ci: bool,
    pub min_toolkit: Option<ToolkitVersion>,
    pub max_toolkit: Option<ToolkitVersion>,
    pub filter: Vec<String>,
    pub repeat_count: u32,
    pub debug: bool,
    /// Card-management key, forwarded on device runs.
    pub card_key: Option<String>,
    pub output_dir: PathBuf,
    pub platform: Platform,
}

impl RunConfig {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            target: ExecutionTarget::Simulator,
            ci: false,
            min_toolkit: None,
            max_toolkit: None,
            filter: Vec::new(),
            repeat_count: DEFAULT_REPEAT_COUNT,
            debug: false,
            card_key: None,
            output_dir: PathBuf::from("."),
            platform: Platform::current(),
        }
    }

    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    pub fn with_toolkit_bounds(
        mut self,
        min: Option<ToolkitVersion>,
        max: Option<ToolkitVersion>,
    ) -> Self {
        self.min_toolkit = min;
        self.max_toolkit = max;
        self
    }

    pub fn with_filter(mut self, filter: Vec<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_repeat_count(mut self, repeat_count: u32) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_card_key(mut self, key: Option<String>) -> Self {
        self.card_key = key;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.target.failure_policy()
    }

    /// Device and statistics runs execute the whole pipeline in one pass.
    pub fn is_single_pass(&self) -> bool {
        self.target == ExecutionTarget::Device || self.mode == RunMode::Stats
    }

    /// Raise the minimum tool-kit to `floor` if it is currently lower or unset.
    ///
    /// Returns true when the minimum changed.
    pub fn raise_min_toolkit(&mut self, floor: ToolkitVersion) -> bool {
        match &self.min_toolkit {
            Some(current) if *current >= floor => false,
            _ => {
                self.min_toolkit = Some(floor);
                true
            }
        }
    }

    /// Reject contradictory settings before anything runs.
    pub fn validate(self) -> Result<Self> {
        if self.mode == RunMode::Stats && self.target == ExecutionTarget::Device {
            return Err(HarnessError::IncompatibleMode { mode: self.mode });
        }
        if let (Some(min), Some(max)) = (&self.min_toolkit, &self.max_toolkit)
            && max < min
        {
            return Err(HarnessError::VersionBounds {
                min: min.clone(),
                max: max.clone(),
            });
        }
        if self.repeat_count == 0 {
            return Err(HarnessError::RepeatCount(self.repeat_count));
        }
        Ok(self)
    }
}
