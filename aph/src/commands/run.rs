//! `aph run`: compile the catalogue and profile every unit.

use super::{load_catalogue, load_settings, run_config};
use crate::RunArgs;
use crate::ui;
use anyhow::Result;
use aph_common::report::RunReport;
use aph_common::{
    Catalogue, ExecutionEngine, GitFixtureProvider, HarnessSettings, Plan, ProcessInvoker,
    RunConfig, compile,
};
use std::path::Path;
use tracing::{error, info};

pub fn run(config_path: Option<&Path>, args: &RunArgs) -> Result<i32> {
    let mut overrides = args.selection.overrides();
    overrides.repeat_count = args.repeat_count;
    let settings = load_settings(config_path, overrides)?;
    let config = run_config(args, &settings)?;
    let catalogue = load_catalogue(&settings)?;

    let plan = compile(&catalogue, &config)?;
    info!(
        mode = %config.mode,
        target = ?config.target,
        units = plan.units.len(),
        skipped = plan.skips.len(),
        "Compiled plan"
    );

    let report = execute(&settings, &config, &catalogue, &plan)?;
    report.write_to(&config.output_dir)?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", ui::render_run_summary(&report));
    }
    if let Some(err) = report.fatal_error() {
        error!(code = err.code().entry().code, "{err}");
    }
    Ok(report.exit_code())
}

/// Run `plan` against the real profiler and fixture sources.
pub fn execute(
    settings: &HarnessSettings,
    config: &RunConfig,
    catalogue: &Catalogue,
    plan: &Plan<'_>,
) -> Result<RunReport> {
    let layout = settings.toolkit_layout();
    let fixtures = GitFixtureProvider::new(&settings.fixtures_dir.value);
    if !plan.is_empty() {
        fixtures.prepare_auxiliary(&catalogue.auxiliary, &layout)?;
    }
    let invoker = ProcessInvoker::new(&settings.java.value, &settings.profiler_jar.value);
    let mut engine = ExecutionEngine::new(config, &layout, settings.data_root(), invoker, fixtures);
    Ok(engine.run(plan)?)
}
