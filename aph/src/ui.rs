//! Terminal rendering: run summaries, plans and errors.
//!
//! Skips are yellow and failures red. Renderers return strings so they can be
//! tested with colours switched off.

use aph_common::report::RunReport;
use aph_common::stats::AggregateSummary;
use aph_common::{HarnessError, Plan};
use colored::Colorize;
use std::fmt::Write as _;

pub fn render_run_summary(report: &RunReport) -> String {
    let mut out = String::new();

    if !report.skips.is_empty() {
        let _ = writeln!(out, "{}", format!("Skipped ({}):", report.skips.len()).yellow().bold());
        for skip in &report.skips {
            let _ = writeln!(out, "  {}", skip.to_string().yellow());
        }
    }
    if !report.failures.is_empty() {
        let _ = writeln!(out, "{}", format!("Failed ({}):", report.failures.len()).red().bold());
        for failure in &report.failures {
            let _ = writeln!(out, "  {}", failure.to_string().red());
        }
    }

    let failed = report.failures.len();
    let totals = format!(
        "{} attempted, {} succeeded, {} failed, {} skipped",
        report.units_attempted,
        report.units_succeeded,
        failed,
        report.skips.len()
    );
    let status = if report.aborted {
        "ABORTED".red().bold()
    } else if failed > 0 {
        "DONE WITH FAILURES".yellow().bold()
    } else {
        "OK".green().bold()
    };
    let _ = writeln!(out, "{status} {} mode: {totals}", report.mode);
    out
}

pub fn render_plan(plan: &Plan<'_>) -> String {
    let mut out = String::new();
    for unit in &plan.units {
        let _ = writeln!(out, "  {}  {}", unit.identity().dimmed(), unit.label());
    }
    for skip in &plan.skips {
        let _ = writeln!(out, "  {}", format!("skip {skip}").yellow());
    }
    let _ = writeln!(
        out,
        "{} units, {} skipped",
        plan.units.len().to_string().bold(),
        plan.skips.len()
    );
    out
}

pub fn render_stats_summary(summary: &AggregateSummary) -> String {
    let mut out = String::new();
    let merge = &summary.merge;
    let _ = writeln!(out, "Analysed {} projects.", merge.projects);
    if merge.disabled > 0 {
        let _ = writeln!(out, "{}", format!("{} disabled on this platform", merge.disabled).yellow());
    }
    if !merge.incomplete.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "{} did not have all dependencies on the class path: {}",
                merge.incomplete.len(),
                merge.incomplete.join(", ")
            )
            .yellow()
        );
    }
    if !merge.missing.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!("No usage report for: {}", merge.missing.join(", ")).red()
        );
    }
    for table in &summary.tables {
        let _ = writeln!(
            out,
            "  {:<10} {} of {} listed symbols used",
            table.manifest, table.used, table.listed
        );
    }
    let _ = writeln!(
        out,
        "  {:<10} {} symbols outside every manifest ({} distinct overall)",
        "thirdparty", summary.third_party, summary.symbols
    );
    out
}

pub fn print_error(err: &anyhow::Error) {
    match err.downcast_ref::<HarnessError>() {
        Some(harness) => {
            let entry = harness.code().entry();
            eprintln!("{} {err:#}", format!("error[{}]:", entry.code).red().bold());
            for hint in entry.remediation {
                eprintln!("  {} {hint}", "hint:".cyan());
            }
        }
        None => eprintln!("{} {err:#}", "error:".red().bold()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aph_common::eligibility::SkipReason;
    use aph_common::report::SkipEntry;
    use aph_common::types::{Platform, RunMode};
    use aph_common::RunConfig;

    #[test]
    fn test_run_summary_lists_skips() {
        colored::control::set_override(false);
        let mut report = RunReport::new(&RunConfig::new(RunMode::Memory));
        report.record_skip(SkipEntry::new(
            "Wallet",
            None,
            SkipReason::Disabled(Platform::Linux),
        ));
        report.units_attempted = 2;
        report.units_succeeded = 2;

        let text = render_run_summary(&report);
        assert!(text.contains("Skipped (1):\n  Wallet: disabled on Linux\n"));
        assert!(!text.contains("Failed"));
        assert!(text.ends_with("OK memory mode: 2 attempted, 2 succeeded, 0 failed, 1 skipped\n"));
    }
}
