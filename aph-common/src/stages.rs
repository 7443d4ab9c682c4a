//! Profiler command construction.
//!
//! A [`ToolCommand`] accumulates typed [`ToolOption`]s and renders the final
//! argument vector once per stage. Stage bounds are never part of the option
//! set; they come from a [`StageScope`], which only exists for staged plans.

use crate::catalogue::InputSpec;
use crate::errors::{Result, StageLabel};
use crate::plan::{ExecutionUnit, UnitKind};
use crate::run_config::RunConfig;
use crate::toolkit::{ToolkitLayout, effective_toolkit};
use crate::types::{ExecutionTarget, RunMode, Stage};
use std::ffi::OsString;
use std::fmt;
use std::mem::discriminant;
use std::path::{Path, PathBuf};

/// How subtest input is split into profiling buckets.
pub const INPUT_DIVISION: &str = "effectiveBitLength";

/// Where a subtest's input data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Regex(String),
    File(PathBuf),
}

/// One recognised profiler option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOption {
    Toolkit(PathBuf),
    /// Class-path jar; may be given several times.
    Jar(PathBuf),
    Debug,
    RepeatCount(u32),
    Simulator,
    Key(String),
    EntryPoint(String),
    ResetIns(String),
    Cla(String),
    WorkDir(PathBuf),
    Executable(String),
    Data(DataSource),
    InputDivision(String),
    Ins(String),
    P1(String),
    P2(String),
    Mode(RunMode),
}

impl ToolOption {
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Toolkit(_) => "--jckit",
            Self::Jar(_) => "--jar",
            Self::Debug => "--debug",
            Self::RepeatCount(_) => "--repeat-count",
            Self::Simulator => "--simulator",
            Self::Key(_) => "--key",
            Self::EntryPoint(_) => "--entry-point",
            Self::ResetIns(_) => "--reset-ins",
            Self::Cla(_) => "--cla",
            Self::WorkDir(_) => "--work-dir",
            Self::Executable(_) => "--executable",
            Self::Data(DataSource::Regex(_)) => "--data-regex",
            Self::Data(DataSource::File(_)) => "--data-file",
            Self::InputDivision(_) => "--input-division",
            Self::Ins(_) => "--ins",
            Self::P1(_) => "--p1",
            Self::P2(_) => "--p2",
            Self::Mode(_) => "--mode",
        }
    }

    fn value(&self) -> Option<OsString> {
        match self {
            Self::Debug | Self::Simulator => None,
            Self::Toolkit(path) | Self::Jar(path) | Self::WorkDir(path) => {
                Some(path.clone().into_os_string())
            }
            Self::Data(DataSource::File(path)) => Some(path.clone().into_os_string()),
            Self::RepeatCount(count) => Some(count.to_string().into()),
            Self::Mode(mode) => Some(mode.as_str().into()),
            Self::Key(value)
            | Self::EntryPoint(value)
            | Self::ResetIns(value)
            | Self::Cla(value)
            | Self::Executable(value)
            | Self::Data(DataSource::Regex(value))
            | Self::InputDivision(value)
            | Self::Ins(value)
            | Self::P1(value)
            | Self::P2(value) => Some(value.into()),
        }
    }

    fn is_repeatable(&self) -> bool {
        matches!(self, Self::Jar(_))
    }
}

/// Stage bounds of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageScope {
    /// `--start-from <stage> --stop-after <stage>`.
    Single(Stage),
    /// The whole pipeline in one go.
    Unbounded,
}

impl StageScope {
    pub fn label(self) -> StageLabel {
        match self {
            Self::Single(stage) => StageLabel::Bounded(stage),
            Self::Unbounded => StageLabel::All,
        }
    }
}

impl fmt::Display for StageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.label().fmt(f)
    }
}

/// Stages a unit runs through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePlan {
    /// One invocation per listed stage.
    Staged(Vec<Stage>),
    /// One invocation without stage bounds.
    Unbounded,
}

impl StagePlan {
    pub fn scopes(&self) -> Vec<StageScope> {
        match self {
            Self::Staged(stages) => stages.iter().copied().map(StageScope::Single).collect(),
            Self::Unbounded => vec![StageScope::Unbounded],
        }
    }
}

/// Accumulated option set for one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCommand {
    options: Vec<ToolOption>,
}

impl ToolCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an option. A non-repeatable option replaces an earlier one of the
    /// same kind in place, so a data regex and a data file never coexist.
    pub fn set(&mut self, option: ToolOption) -> &mut Self {
        if !option.is_repeatable()
            && let Some(existing) = self
                .options
                .iter_mut()
                .find(|existing| discriminant(&**existing) == discriminant(&option))
        {
            *existing = option;
            return self;
        }
        self.options.push(option);
        self
    }

    pub fn set_opt(&mut self, option: Option<ToolOption>) -> &mut Self {
        if let Some(option) = option {
            self.set(option);
        }
        self
    }

    pub fn options(&self) -> &[ToolOption] {
        &self.options
    }

    pub fn contains_flag(&self, flag: &str) -> bool {
        self.options.iter().any(|option| option.flag() == flag)
    }

    /// Render the argument vector for one stage scope.
    pub fn render(&self, scope: StageScope) -> Invocation {
        let mut args = Vec::with_capacity(self.options.len() * 2 + 4);
        for option in &self.options {
            args.push(OsString::from(option.flag()));
            if let Some(value) = option.value() {
                args.push(value);
            }
        }
        if let StageScope::Single(stage) = scope {
            args.push("--start-from".into());
            args.push(stage.as_str().into());
            args.push("--stop-after".into());
            args.push(stage.as_str().into());
        }
        Invocation { args, scope }
    }
}

/// One rendered profiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<OsString>,
    pub scope: StageScope,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.args {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Turns execution units into profiler invocations for one run.
#[derive(Debug, Clone)]
pub struct CommandBuilder<'a> {
    layout: &'a ToolkitLayout,
    config: &'a RunConfig,
    /// Relative `inputFile` paths resolve against this directory.
    data_root: PathBuf,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(layout: &'a ToolkitLayout, config: &'a RunConfig, data_root: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            config,
            data_root: data_root.into(),
        }
    }

    /// Run-wide options for `unit`: tool-kit, class path and target.
    pub fn base_command(&self, unit: &ExecutionUnit<'_>) -> Result<ToolCommand> {
        let mut command = ToolCommand::new();
        let toolkit = effective_toolkit(unit.min_toolkit(), self.config.min_toolkit.as_ref());
        command.set(ToolOption::Toolkit(self.layout.toolkit_path(toolkit)));
        for jar in self.layout.auxiliary_jars(&unit.descriptor.auxiliary)? {
            command.set(ToolOption::Jar(jar));
        }
        if self.config.debug {
            command.set(ToolOption::Debug);
        }
        if self.config.mode == RunMode::Stats {
            return Ok(command);
        }

        command.set(ToolOption::RepeatCount(self.config.repeat_count));
        match self.config.target {
            ExecutionTarget::Simulator => {
                command.set(ToolOption::Simulator);
            }
            ExecutionTarget::Device => {
                command.set_opt(self.config.card_key.clone().map(ToolOption::Key));
            }
        }
        Ok(command)
    }

    /// Full option set for `unit`, working in `workdir`.
    pub fn unit_command(&self, unit: &ExecutionUnit<'_>, workdir: &Path) -> Result<ToolCommand> {
        let mut command = self.base_command(unit)?;

        if unit.kind != UnitKind::Statistics {
            if let Some(ep) = unit.entry_point {
                command.set(ToolOption::EntryPoint(ep.name.clone()));
            }
            let selectors = unit.selectors();
            command.set_opt(selectors.reset_ins.clone().map(ToolOption::ResetIns));
            command.set_opt(selectors.cla.clone().map(ToolOption::Cla));
        }

        command.set(ToolOption::WorkDir(workdir.to_path_buf()));

        if let UnitKind::Subtest(subtest) = unit.kind {
            command.set(ToolOption::Executable(subtest.executable.clone()));
            let data = match &subtest.input {
                InputSpec::Pattern(pattern) => DataSource::Regex(pattern.clone()),
                InputSpec::File(path) => DataSource::File(self.data_root.join(path)),
            };
            command.set(ToolOption::Data(data));
            command.set(ToolOption::InputDivision(INPUT_DIVISION.to_string()));
            command.set_opt(subtest.ins.clone().map(ToolOption::Ins));
            command.set_opt(subtest.p1.clone().map(ToolOption::P1));
            command.set_opt(subtest.p2.clone().map(ToolOption::P2));
        }

        command.set(ToolOption::Mode(unit.mode));
        Ok(command)
    }

    /// Stages `unit` runs through.
    ///
    /// Device and statistics runs collapse to one unbounded pass. Otherwise a
    /// recorded stopping stage truncates the pipeline after that stage.
    pub fn stage_plan(&self, unit: &ExecutionUnit<'_>) -> StagePlan {
        if self.config.is_single_pass() {
            return StagePlan::Unbounded;
        }
        match unit.declared_failure().and_then(|failure| failure.stop_after) {
            Some(last) => StagePlan::Staged(Stage::up_to(last)),
            None => StagePlan::Staged(Stage::ALL.to_vec()),
        }
    }

    /// Every invocation of `unit`, in order.
    pub fn invocations(&self, unit: &ExecutionUnit<'_>, workdir: &Path) -> Result<Vec<Invocation>> {
        let command = self.unit_command(unit, workdir)?;
        Ok(self
            .stage_plan(unit)
            .scopes()
            .into_iter()
            .map(|scope| command.render(scope))
            .collect())
    }
}
