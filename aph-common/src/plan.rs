//! Test plan compilation: catalogue + run configuration -> ordered execution units.

use crate::catalogue::{
    Catalogue, DeclaredFailure, EntryPoint, Layout, Selectors, Subtest, TestDescriptor,
};
use crate::eligibility::{SkipReason, Verdict, decide};
use crate::errors::Result;
use crate::report::SkipEntry;
use crate::run_config::RunConfig;
use crate::types::RunMode;
use crate::version::ToolkitVersion;
use tracing::{debug, info};

/// What a unit measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind<'a> {
    /// Memory consumed by the applet constructor.
    Constructor,
    Subtest(&'a Subtest),
    /// Static API-usage analysis of the whole module.
    Statistics,
}

/// The atomic thing the execution engine runs.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionUnit<'a> {
    pub descriptor: &'a TestDescriptor,
    pub entry_point: Option<&'a EntryPoint>,
    pub kind: UnitKind<'a>,
    pub mode: RunMode,
}

impl<'a> ExecutionUnit<'a> {
    /// Deterministic, filesystem-safe identity used to name working directories.
    pub fn identity(&self) -> String {
        let mut identity = self.descriptor.slug();
        identity.push('_');
        if let Some(ep) = self.entry_point {
            identity.push_str(&ep.name.replace(' ', "_"));
            identity.push('_');
        }
        match self.kind {
            UnitKind::Constructor => identity.push_str("ctor"),
            UnitKind::Subtest(subtest) => identity.push_str(&subtest.executable.replace(' ', "_")),
            UnitKind::Statistics => identity.push_str("stats"),
        }
        identity
    }

    /// Human-readable label used in logs and the run report.
    pub fn label(&self) -> String {
        let mut label = self.descriptor.name.clone();
        if let Some(ep) = self.entry_point {
            label.push(' ');
            label.push_str(&ep.name);
        }
        match self.kind {
            UnitKind::Constructor => label.push_str(" constructor"),
            UnitKind::Subtest(subtest) => {
                label.push(' ');
                label.push_str(&subtest.executable);
            }
            UnitKind::Statistics => {}
        }
        format!("{label} in {} mode", self.mode)
    }

    /// The failure governing this unit: the entry point's, else the descriptor's.
    pub fn declared_failure(&self) -> Option<&'a DeclaredFailure> {
        match self.entry_point {
            Some(ep) => ep.failure.as_ref(),
            None => self.descriptor.failure.as_ref(),
        }
    }

    /// Oldest tool-kit the unit builds with: the entry point's, else the descriptor's.
    pub fn min_toolkit(&self) -> &'a ToolkitVersion {
        self.entry_point
            .and_then(|ep| ep.min_toolkit.as_ref())
            .unwrap_or(&self.descriptor.min_toolkit)
    }

    pub fn selectors(&self) -> &'a Selectors {
        match self.entry_point {
            Some(ep) => &ep.selectors,
            None => &self.descriptor.selectors,
        }
    }
}

/// Compiled plan: units in execution order plus skips recorded on the way.
#[derive(Debug, Clone, Default)]
pub struct Plan<'a> {
    pub units: Vec<ExecutionUnit<'a>>,
    pub skips: Vec<SkipEntry>,
}

impl<'a> Plan<'a> {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Expand the catalogue into execution units for this run.
///
/// Filtering happens first; a filter that selects nothing is an error.
pub fn compile<'a>(catalogue: &'a Catalogue, config: &RunConfig) -> Result<Plan<'a>> {
    let selected = catalogue.select(&config.filter)?;
    let mut plan = Plan::default();

    for descriptor in selected {
        match decide(descriptor, None, config) {
            Verdict::Skip(reason) => record_descriptor_skip(&mut plan, descriptor, &reason),
            Verdict::Eligible => compile_descriptor(&mut plan, descriptor, config),
        }
    }

    info!(
        units = plan.units.len(),
        skipped = plan.skips.len(),
        mode = %config.mode,
        "Compiled test plan"
    );
    Ok(plan)
}

fn record_descriptor_skip(plan: &mut Plan<'_>, descriptor: &TestDescriptor, reason: &SkipReason) {
    match &descriptor.layout {
        Layout::WithEntryPoints(entry_points) if !entry_points.is_empty() => {
            for ep in entry_points {
                let reason = reason.for_entry_point(ep);
                debug!(test = %descriptor.name, entry_point = %ep.name, %reason, "Skipping");
                plan.skips
                    .push(SkipEntry::new(&descriptor.name, Some(&ep.name), reason));
            }
        }
        _ => {
            debug!(test = %descriptor.name, %reason, "Skipping");
            plan.skips
                .push(SkipEntry::new(&descriptor.name, None, reason.clone()));
        }
    }
}

fn compile_descriptor<'a>(plan: &mut Plan<'a>, descriptor: &'a TestDescriptor, config: &RunConfig) {
    if config.mode == RunMode::Stats {
        plan.units.push(ExecutionUnit {
            descriptor,
            entry_point: None,
            kind: UnitKind::Statistics,
            mode: RunMode::Stats,
        });
        return;
    }

    match &descriptor.layout {
        Layout::Plain(subtests) => expand(plan, descriptor, None, subtests, config),
        Layout::WithEntryPoints(entry_points) => {
            for ep in entry_points {
                match decide(descriptor, Some(ep), config) {
                    Verdict::Eligible => expand(plan, descriptor, Some(ep), &ep.subtests, config),
                    Verdict::Skip(reason) => {
                        let reason = match reason {
                            SkipReason::EmptyTest => SkipReason::FailingTest,
                            other => other,
                        };
                        debug!(test = %descriptor.name, entry_point = %ep.name, %reason, "Skipping");
                        plan.skips
                            .push(SkipEntry::new(&descriptor.name, Some(&ep.name), reason));
                    }
                }
            }
        }
    }
}

fn expand<'a>(
    plan: &mut Plan<'a>,
    descriptor: &'a TestDescriptor,
    entry_point: Option<&'a EntryPoint>,
    subtests: &'a [Subtest],
    config: &RunConfig,
) {
    if config.mode == RunMode::Memory {
        plan.units.push(ExecutionUnit {
            descriptor,
            entry_point,
            kind: UnitKind::Constructor,
            mode: RunMode::Memory,
        });
        // Subtests in memory mode only run as part of CI coverage.
        if !config.ci {
            return;
        }
    }

    for subtest in subtests {
        plan.units.push(ExecutionUnit {
            descriptor,
            entry_point,
            kind: UnitKind::Subtest(subtest),
            mode: config.mode,
        });
    }
}
