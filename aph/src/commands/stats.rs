//! `aph stats`: gather usage reports and write the usage tables.

use super::{load_catalogue, load_settings, stats_config};
use crate::StatsArgs;
use crate::ui;
use anyhow::Result;
use aph_common::compile;
use aph_common::stats::{aggregate, collect_reports, rename_aside};
use std::path::Path;
use tracing::info;

pub fn run(config_path: Option<&Path>, args: &StatsArgs) -> Result<i32> {
    let mut overrides = args.selection.overrides();
    overrides.stats_dir = args.stats_dir.clone();
    overrides.manifests_dir = args.manifests_dir.clone();
    let settings = load_settings(config_path, overrides)?;
    let catalogue = load_catalogue(&settings)?;
    let config = stats_config(&args.selection, &settings)?;
    let stats_dir = &settings.stats_dir.value;

    let mut exit_code = 0;
    if args.skip_collect {
        info!(dir = %stats_dir.display(), "Aggregating existing statistics");
    } else {
        if let Some(old) = rename_aside(stats_dir)? {
            println!("Renamed previous statistics directory to {}", old.display());
        }
        let plan = compile(&catalogue, &config)?;
        let report = super::run::execute(&settings, &config, &catalogue, &plan)?;
        report.write_to(stats_dir)?;
        print!("{}", ui::render_run_summary(&report));
        exit_code = report.exit_code();
        if report.is_fatal() {
            return Ok(exit_code);
        }
    }

    let selected = catalogue.select(&config.filter)?;
    let reports = collect_reports(selected.iter().copied(), stats_dir, config.platform)?;
    let summary = aggregate(&reports, &settings.manifests_dir.value, &settings.output_dir.value)?;
    print!("{}", ui::render_stats_summary(&summary));
    Ok(exit_code)
}
