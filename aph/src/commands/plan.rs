//! `aph plan`: print the compiled plan without running anything.

use super::{load_catalogue, load_settings, run_config};
use crate::RunArgs;
use crate::ui;
use anyhow::Result;
use aph_common::compile;
use std::path::Path;

pub fn show(config_path: Option<&Path>, args: &RunArgs) -> Result<i32> {
    let mut overrides = args.selection.overrides();
    overrides.repeat_count = args.repeat_count;
    let settings = load_settings(config_path, overrides)?;
    let config = run_config(args, &settings)?;
    let catalogue = load_catalogue(&settings)?;
    let plan = compile(&catalogue, &config)?;

    if args.json {
        let units: Vec<String> = plan.units.iter().map(|unit| unit.label()).collect();
        let body = serde_json::json!({
            "mode": config.mode,
            "target": config.target,
            "units": units,
            "skips": plan.skips,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", ui::render_plan(&plan));
    }
    Ok(0)
}
