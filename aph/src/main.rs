//! Applet Profiling Harness
//!
//! Runs the applet profiler over a catalogue of third-party applets and
//! aggregates their API usage statistics.

#![forbid(unsafe_code)]

mod commands;
mod ui;

use anyhow::Result;
use aph_common::types::{ExecutionTarget, RunMode};
use aph_common::version::ToolkitVersion;
use aph_common::{LogConfig, init_logging};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "aph")]
#[command(author, version, about = "Applet Profiling Harness - profiler regression runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Harness settings file (defaults to ./aph.toml when present)
    #[arg(long, global = true, env = "APH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile the catalogue's applets
    Run(RunArgs),

    /// Show the units a run would execute, without running them
    Plan(RunArgs),

    /// Collect usage statistics and write the usage tables
    Stats(StatsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Memory,
    Time,
    Stats,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Memory => RunMode::Memory,
            ModeArg::Time => RunMode::Time,
            ModeArg::Stats => RunMode::Stats,
        }
    }
}

/// Options shared by every subcommand that selects and runs tests.
#[derive(Args, Debug, Clone, Default)]
struct SelectionArgs {
    /// Only tests whose name contains one of these (case-insensitive)
    filter: Vec<String>,

    /// Test catalogue (JSON or TOML)
    #[arg(long)]
    catalogue: Option<PathBuf>,

    /// Root directory for per-unit working directories
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Profiler jar
    #[arg(long)]
    profiler_jar: Option<PathBuf>,

    /// Java launcher
    #[arg(long)]
    java: Option<PathBuf>,

    /// Pass the debug flag to the profiler
    #[arg(long)]
    debug: bool,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// What to measure
    #[arg(value_enum)]
    mode: ModeArg,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Lowest tool-kit version to use
    #[arg(long, value_parser = parse_version)]
    min_toolkit: Option<ToolkitVersion>,

    /// Highest tool-kit version to use
    #[arg(long, value_parser = parse_version)]
    max_toolkit: Option<ToolkitVersion>,

    /// Run on a physical card instead of the simulator
    #[arg(long, visible_alias = "device")]
    card: bool,

    /// Card-management key (card runs only)
    #[arg(long, requires = "card")]
    key: Option<String>,

    /// Also run partially-working tests
    #[arg(long)]
    ci: bool,

    /// Profiling rounds per subtest
    #[arg(short = 'n', long)]
    repeat_count: Option<u32>,

    /// Do not derive a minimum tool-kit from the installed JDK
    #[arg(long)]
    no_jdk_probe: bool,

    /// Print the run report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn target(&self) -> ExecutionTarget {
        if self.card {
            ExecutionTarget::Device
        } else {
            ExecutionTarget::Simulator
        }
    }
}

#[derive(Args, Debug, Clone)]
struct StatsArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    /// Aggregate the existing statistics directory without running the profiler
    #[arg(long)]
    skip_collect: bool,

    /// Where statistics-mode working directories go
    #[arg(long)]
    stats_dir: Option<PathBuf>,

    /// Directory containing {constants,types,methods}-in.txt
    #[arg(long)]
    manifests_dir: Option<PathBuf>,
}

fn parse_version(raw: &str) -> std::result::Result<ToolkitVersion, String> {
    raw.parse()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = match init_logging(&log_config) {
        Ok(guards) => guards,
        Err(err) => {
            ui::print_error(&err.into());
            return ExitCode::FAILURE;
        }
    };

    match dispatch(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            ui::print_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => commands::run::run(config, &args),
        Commands::Plan(args) => commands::plan::show(config, &args),
        Commands::Stats(args) => commands::stats::run(config, &args),
    }
}
