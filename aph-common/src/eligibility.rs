//! Skip decisions: whether a descriptor (or one of its entry points) runs.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. disabled on the current platform
//! 2. statistics mode bypasses everything below
//! 3. declared failure (`failing test` outside CI runs, `empty test` when no
//!    stopping stage is recorded)
//! 4. tool-kit version bounds
//! 5. time mode without subtests

use crate::catalogue::{DeclaredFailure, EntryPoint, Layout, TestDescriptor};
use crate::run_config::RunConfig;
use crate::types::{Platform, RunMode};
use crate::version::ToolkitVersion;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled(Platform),
    FailingTest,
    EmptyTest,
    RequiresOlderToolkit,
    RequiresNewerToolkit,
    NoSubtests,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled(platform) => write!(f, "disabled on {platform}"),
            Self::FailingTest => f.write_str("failing test"),
            Self::EmptyTest => f.write_str("empty test"),
            Self::RequiresOlderToolkit => {
                f.write_str("requires older tool-kit than specified in --min-toolkit")
            }
            Self::RequiresNewerToolkit => {
                f.write_str("requires newer tool-kit than specified in --max-toolkit")
            }
            Self::NoSubtests => f.write_str("no subtests"),
        }
    }
}

impl SkipReason {
    /// Reason reported for an entry point when its parent is skipped.
    ///
    /// An entry point that declares its own failure always reads `failing test`.
    pub fn for_entry_point(&self, entry_point: &EntryPoint) -> SkipReason {
        if entry_point.failure.is_some() {
            SkipReason::FailingTest
        } else {
            self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Skip(SkipReason),
}

impl Verdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Decide whether `descriptor`, or its `entry_point` when given, should run.
pub fn decide(
    descriptor: &TestDescriptor,
    entry_point: Option<&EntryPoint>,
    config: &RunConfig,
) -> Verdict {
    if !descriptor.platforms.enabled_on(config.platform) {
        return Verdict::Skip(SkipReason::Disabled(config.platform));
    }

    if config.mode == RunMode::Stats {
        return Verdict::Eligible;
    }

    if let Some(reason) = failure_verdict(descriptor, entry_point, config) {
        return Verdict::Skip(reason);
    }

    let (min, max) = toolkit_bounds(descriptor, entry_point);
    if let (Some(max), Some(floor)) = (max, config.min_toolkit.as_ref())
        && max < floor
    {
        return Verdict::Skip(SkipReason::RequiresOlderToolkit);
    }
    if let Some(ceiling) = config.max_toolkit.as_ref()
        && min > ceiling
    {
        return Verdict::Skip(SkipReason::RequiresNewerToolkit);
    }

    if config.mode == RunMode::Time {
        let has_subtests = match entry_point {
            Some(ep) => !ep.subtests.is_empty(),
            None => descriptor.has_subtests(),
        };
        if !has_subtests {
            return Verdict::Skip(SkipReason::NoSubtests);
        }
    }

    Verdict::Eligible
}

fn failure_verdict(
    descriptor: &TestDescriptor,
    entry_point: Option<&EntryPoint>,
    config: &RunConfig,
) -> Option<SkipReason> {
    let failures: Vec<&DeclaredFailure> = match entry_point {
        Some(ep) => ep.failure.iter().collect(),
        None => match (&descriptor.failure, &descriptor.layout) {
            (Some(failure), _) => vec![failure],
            (None, Layout::WithEntryPoints(eps))
                if !eps.is_empty() && eps.iter().all(|ep| ep.failure.is_some()) =>
            {
                eps.iter().filter_map(|ep| ep.failure.as_ref()).collect()
            }
            _ => Vec::new(),
        },
    };

    if failures.is_empty() {
        return None;
    }
    if !config.ci {
        return Some(SkipReason::FailingTest);
    }
    if failures.iter().all(|failure| failure.stop_after.is_none()) {
        return Some(SkipReason::EmptyTest);
    }
    None
}

/// Effective (min, max) bounds; entry-point overrides win over the parent's.
fn toolkit_bounds<'a>(
    descriptor: &'a TestDescriptor,
    entry_point: Option<&'a EntryPoint>,
) -> (&'a ToolkitVersion, Option<&'a ToolkitVersion>) {
    let min = entry_point
        .and_then(|ep| ep.min_toolkit.as_ref())
        .unwrap_or(&descriptor.min_toolkit);
    let max = entry_point
        .and_then(|ep| ep.max_toolkit.as_ref())
        .or(descriptor.max_toolkit.as_ref());
    (min, max)
}
