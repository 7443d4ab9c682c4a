//! Subcommand implementations.

pub mod plan;
pub mod run;
pub mod stats;

use crate::{RunArgs, SelectionArgs};
use anyhow::{Context, Result};
use aph_common::config::{EnvParser, HarnessFile};
use aph_common::toolkit::probe_jdk_floor;
use aph_common::types::{ExecutionTarget, RunMode};
use aph_common::{Catalogue, HarnessSettings, RunConfig, SettingsOverrides};
use std::path::Path;
use tracing::{debug, warn};

impl SelectionArgs {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            catalogue: self.catalogue.clone(),
            output_dir: self.output_dir.clone(),
            profiler_jar: self.profiler_jar.clone(),
            java: self.java.clone(),
            ..Default::default()
        }
    }
}

/// Resolve settings from the command line, environment and `aph.toml`.
pub fn load_settings(config: Option<&Path>, overrides: SettingsOverrides) -> Result<HarnessSettings> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let file = HarnessFile::discover(config, &cwd)?;
    if let Some((path, _)) = &file {
        debug!(path = %path.display(), "Loaded harness settings");
    }
    let mut env = EnvParser::new();
    Ok(HarnessSettings::resolve(file, overrides, &mut env)?)
}

pub fn load_catalogue(settings: &HarnessSettings) -> Result<Catalogue> {
    let catalogue = Catalogue::load(&settings.catalogue.value)?;
    debug!(
        path = %settings.catalogue.value.display(),
        tests = catalogue.tests.len(),
        "Loaded catalogue"
    );
    Ok(catalogue)
}

/// Build the validated run configuration for `run` and `plan`.
pub fn run_config(args: &RunArgs, settings: &HarnessSettings) -> Result<RunConfig> {
    let mode = RunMode::from(args.mode);
    let mut config = RunConfig::new(mode)
        .with_target(args.target())
        .with_ci(args.ci)
        .with_toolkit_bounds(args.min_toolkit.clone(), args.max_toolkit.clone())
        .with_filter(args.selection.filter.clone())
        .with_repeat_count(settings.repeat_count.value)
        .with_debug(args.selection.debug)
        .with_card_key(args.key.clone())
        .with_output_dir(&settings.output_dir.value);

    if !args.no_jdk_probe && mode != RunMode::Stats {
        apply_jdk_floor(&mut config, &settings.javac.value)?;
    }
    Ok(config.validate()?)
}

/// Configuration of a statistics collection run.
pub fn stats_config(selection: &SelectionArgs, settings: &HarnessSettings) -> Result<RunConfig> {
    let config = RunConfig::new(RunMode::Stats)
        .with_target(ExecutionTarget::Simulator)
        .with_filter(selection.filter.clone())
        .with_repeat_count(settings.repeat_count.value)
        .with_debug(selection.debug)
        .with_output_dir(&settings.stats_dir.value);
    Ok(config.validate()?)
}

fn apply_jdk_floor(config: &mut RunConfig, javac: &Path) -> Result<()> {
    let Some((major, floor)) = probe_jdk_floor(javac)? else {
        return Ok(());
    };
    if config.raise_min_toolkit(floor.clone()) {
        warn!(
            jdk = major,
            min_toolkit = %floor,
            "JDK {major} cannot build for older tool-kits, raising the minimum"
        );
    }
    Ok(())
}
