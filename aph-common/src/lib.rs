//! Applet Profiling Harness library.
//!
//! Compiles a catalogue of applets into an ordered plan of execution units,
//! runs each unit through the profiler's staged pipeline, and aggregates the
//! symbol-usage reports of statistics runs.

pub mod catalogue;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod errors;
pub mod fixtures;
pub mod invoker;
pub mod logging;
pub mod plan;
pub mod report;
pub mod run_config;
pub mod stages;
pub mod stats;
pub mod testing;
pub mod toolkit;
pub mod types;
pub mod version;

pub use catalogue::{Catalogue, TestDescriptor};
pub use config::{HarnessFile, HarnessSettings, SettingsOverrides};
pub use eligibility::{SkipReason, Verdict};
pub use engine::{ExecutionEngine, UnitOutcome, WorkdirProvider};
pub use errors::{ErrorCategory, ErrorCode, HarnessError, Result, StageLabel};
pub use fixtures::{EditPolicy, FixtureProvider, GitFixtureProvider};
pub use invoker::{ProcessInvoker, ToolInvoker};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use plan::{ExecutionUnit, Plan, UnitKind, compile};
pub use report::{FailureEntry, RunReport, SkipEntry};
pub use run_config::RunConfig;
pub use stages::{CommandBuilder, Invocation, StagePlan, StageScope, ToolCommand, ToolOption};
pub use toolkit::ToolkitLayout;
pub use types::{ExecutionTarget, FailurePolicy, Platform, RunMode, Stage};
pub use version::ToolkitVersion;
