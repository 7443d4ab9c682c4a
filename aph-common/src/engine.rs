//! Execution engine: runs compiled units stage by stage.
//!
//! Units run strictly in plan order, one stage at a time. Under the strict
//! policy the first non-zero exit stops the run; under the tolerant policy the
//! failure is recorded, the rest of that unit is abandoned and the next unit
//! starts.

use crate::errors::{HarnessError, Result};
use crate::fixtures::{EditPolicy, FixtureProvider};
use crate::invoker::ToolInvoker;
use crate::plan::{ExecutionUnit, Plan};
use crate::report::{FailureEntry, RunReport};
use crate::run_config::RunConfig;
use crate::stages::{CommandBuilder, StagePlan, StageScope, ToolCommand};
use crate::toolkit::ToolkitLayout;
use crate::types::FailurePolicy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Result of running one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Succeeded,
    Failed { scope: StageScope, exit_code: i32 },
    /// No stages to run; counted as neither success nor failure.
    NotAttempted,
}

/// Creates one fresh working directory per unit below the output root.
#[derive(Debug, Clone)]
pub struct WorkdirProvider {
    output_dir: PathBuf,
}

impl WorkdirProvider {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// New empty directory named `<identity>_<random>`, seeded with `module_dir`.
    ///
    /// Existing directories are never reused.
    pub fn acquire(&self, identity: &str, module_dir: &Path) -> Result<PathBuf> {
        let workdir_error = |path: &Path, source| HarnessError::Workdir {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.output_dir).map_err(|err| workdir_error(&self.output_dir, err))?;
        let workdir = tempfile::Builder::new()
            .prefix(&format!("{identity}_"))
            .tempdir_in(&self.output_dir)
            .map_err(|err| workdir_error(&self.output_dir, err))?
            .keep();
        let workdir = std::path::absolute(&workdir).map_err(|err| workdir_error(&workdir, err))?;
        copy_tree(module_dir, &workdir).map_err(|err| workdir_error(module_dir, err))?;
        debug!(workdir = %workdir.display(), "Created working directory");
        Ok(workdir)
    }
}

/// Recursively copy the contents of `from` into the existing directory `to`.
///
/// Symbolic links are followed; the copy holds what they point at.
pub fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if fs::metadata(entry.path())?.is_dir() {
            fs::create_dir_all(&target)?;
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Drives a compiled plan through the invoker.
pub struct ExecutionEngine<'a, I, F> {
    config: &'a RunConfig,
    builder: CommandBuilder<'a>,
    workdirs: WorkdirProvider,
    invoker: I,
    fixtures: F,
}

impl<'a, I: ToolInvoker, F: FixtureProvider> ExecutionEngine<'a, I, F> {
    pub fn new(
        config: &'a RunConfig,
        layout: &'a ToolkitLayout,
        data_root: impl Into<PathBuf>,
        invoker: I,
        fixtures: F,
    ) -> Self {
        Self {
            config,
            builder: CommandBuilder::new(layout, config, data_root),
            workdirs: WorkdirProvider::new(&config.output_dir),
            invoker,
            fixtures,
        }
    }

    /// Run every unit of `plan` and return the finished report.
    ///
    /// Fixture, working-directory and spawn errors are fatal regardless of
    /// policy and are returned as errors. Stage failures are recorded.
    pub fn run(&mut self, plan: &Plan<'_>) -> Result<RunReport> {
        let mut report = RunReport::new(self.config);
        report.extend_skips(plan.skips.iter().cloned());
        let policy = self.config.failure_policy();
        let edit_policy = EditPolicy::for_run(self.config);

        let mut prepared: Option<(&str, PathBuf)> = None;
        for unit in &plan.units {
            let source_root = match &prepared {
                Some((name, root)) if *name == unit.descriptor.name => root.clone(),
                _ => {
                    info!(test = %unit.descriptor.name, "Preparing sources");
                    let root = self.fixtures.prepare(unit.descriptor, edit_policy)?;
                    prepared = Some((unit.descriptor.name.as_str(), root.clone()));
                    root
                }
            };
            let module_dir = source_root.join(&unit.descriptor.path);

            match self.run_unit(unit, &module_dir)? {
                UnitOutcome::Succeeded => {
                    report.units_attempted += 1;
                    report.units_succeeded += 1;
                }
                UnitOutcome::NotAttempted => {
                    debug!(unit = %unit.label(), "No stages to run");
                }
                UnitOutcome::Failed { scope, exit_code } => {
                    report.units_attempted += 1;
                    report.record_failure(FailureEntry::new(unit, scope.label(), exit_code));
                    match policy {
                        FailurePolicy::Strict => {
                            error!(unit = %unit.label(), stage = %scope, exit_code, "Stage failed, stopping run");
                            report.abort();
                            break;
                        }
                        FailurePolicy::Tolerant => {
                            warn!(unit = %unit.label(), stage = %scope, exit_code, "Stage failed, continuing");
                        }
                    }
                }
            }
        }

        report.finish();
        info!(
            attempted = report.units_attempted,
            succeeded = report.units_succeeded,
            failed = report.failures.len(),
            skipped = report.skips.len(),
            "Run finished"
        );
        Ok(report)
    }

    /// Run one unit from a fresh working directory.
    pub fn run_unit(&mut self, unit: &ExecutionUnit<'_>, module_dir: &Path) -> Result<UnitOutcome> {
        let stages = self.builder.stage_plan(unit);
        if stages.scopes().is_empty() {
            return Ok(UnitOutcome::NotAttempted);
        }
        info!(unit = %unit.label(), "Running");
        let workdir = self.workdirs.acquire(&unit.identity(), module_dir)?;
        let command = self.builder.unit_command(unit, &workdir)?;
        self.execute(&unit.label(), &command, &stages)
    }

    /// Invoke each stage of `stages` in order, stopping at the first failure.
    pub fn execute(
        &mut self,
        label: &str,
        command: &ToolCommand,
        stages: &StagePlan,
    ) -> Result<UnitOutcome> {
        let scopes = stages.scopes();
        if scopes.is_empty() {
            return Ok(UnitOutcome::NotAttempted);
        }
        for scope in scopes {
            let invocation = command.render(scope);
            info!(unit = label, stage = %scope, args = %invocation, "Executing stage");
            let exit_code = self.invoker.invoke(&invocation)?;
            debug!(unit = label, stage = %scope, exit_code, "Stage finished");
            if exit_code != 0 {
                return Ok(UnitOutcome::Failed { scope, exit_code });
            }
        }
        Ok(UnitOutcome::Succeeded)
    }

    pub fn into_parts(self) -> (I, F) {
        (self.invoker, self.fixtures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Catalogue;
    use crate::plan::compile;
    use crate::stages::ToolOption;
    use crate::testing::{LocalFixtureProvider, ScriptedInvoker};
    use crate::types::{ExecutionTarget, Platform, RunMode, Stage};

    const CATALOGUE: &str = r#"{"tests": [
        {"name": "First", "repo": "r", "path": "src", "jckit": "222",
         "subtests": [{"executable": "a", "input": "00"}]},
        {"name": "Second", "repo": "r", "path": "src", "jckit": "222",
         "subtests": [{"executable": "b", "input": "00"}]}
    ]}"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        sources: PathBuf,
        output: PathBuf,
        layout: ToolkitLayout,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources");
        for name in ["First", "Second"] {
            let module = sources.join(name).join("src");
            fs::create_dir_all(&module).unwrap();
            fs::write(module.join("Applet.java"), "class Applet {}").unwrap();
        }
        Fixture {
            sources,
            output: dir.path().join("out"),
            layout: ToolkitLayout::new(dir.path().join("kits"), dir.path().join("aux")),
            _dir: dir,
        }
    }

    fn config(fx: &Fixture, target: ExecutionTarget) -> RunConfig {
        RunConfig::new(RunMode::Time)
            .with_platform(Platform::Linux)
            .with_target(target)
            .with_output_dir(&fx.output)
    }

    #[test]
    fn test_strict_failure_stops_the_run() {
        let fx = fixture();
        let cat = Catalogue::from_json_str(CATALOGUE).unwrap();
        let config = config(&fx, ExecutionTarget::Simulator);
        let plan = compile(&cat, &config).unwrap();

        let mut invoker = ScriptedInvoker::new()
            .fail_when(|inv| inv.scope == StageScope::Single(Stage::Compilation), 2);
        let mut engine = ExecutionEngine::new(
            &config,
            &fx.layout,
            "",
            &mut invoker,
            LocalFixtureProvider::new(&fx.sources),
        );
        let report = engine.run(&plan).unwrap();

        assert!(report.aborted);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].unit, "First a in time mode");
        assert_eq!(report.failures[0].exit_code, 2);
        // instrumentation + compilation of the first unit only
        assert_eq!(invoker.calls().len(), 2);
    }

    #[test]
    fn test_tolerant_failure_continues() {
        let fx = fixture();
        let cat = Catalogue::from_json_str(CATALOGUE).unwrap();
        let config = config(&fx, ExecutionTarget::Device);
        let plan = compile(&cat, &config).unwrap();

        let mut invoker =
            ScriptedInvoker::new().fail_when(|inv| inv.args.iter().any(|arg| arg == "a"), 1);
        let mut engine = ExecutionEngine::new(
            &config,
            &fx.layout,
            "",
            &mut invoker,
            LocalFixtureProvider::new(&fx.sources),
        );
        let report = engine.run(&plan).unwrap();

        assert!(!report.aborted);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.units_attempted, 2);
        assert_eq!(report.units_succeeded, 1);
        // one unbounded pass per unit
        assert_eq!(invoker.calls().len(), 2);
        assert!(invoker.calls().iter().all(|inv| inv.scope == StageScope::Unbounded));
    }

    #[test]
    fn test_workdirs_are_fresh_and_seeded() {
        let fx = fixture();
        let workdirs = WorkdirProvider::new(&fx.output);
        let module = fx.sources.join("First").join("src");
        let first = workdirs.acquire("First_a", &module).unwrap();
        let second = workdirs.acquire("First_a", &module).unwrap();

        assert_ne!(first, second);
        assert!(first.is_absolute());
        assert!(
            first
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("First_a_")
        );
        assert!(first.join("Applet.java").is_file());
        assert!(second.join("Applet.java").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_workdir_copy_follows_directory_links() {
        let fx = fixture();
        let shared = fx.sources.join("shared");
        fs::create_dir_all(&shared).unwrap();
        fs::write(shared.join("Util.java"), "class Util {}").unwrap();
        let module = fx.sources.join("First").join("src");
        std::os::unix::fs::symlink(&shared, module.join("lib")).unwrap();
        std::os::unix::fs::symlink(shared.join("Util.java"), module.join("Alias.java")).unwrap();

        let workdir = WorkdirProvider::new(&fx.output).acquire("First_a", &module).unwrap();

        let lib = workdir.join("lib");
        assert!(fs::symlink_metadata(&lib).unwrap().is_dir());
        assert_eq!(fs::read_to_string(lib.join("Util.java")).unwrap(), "class Util {}");
        assert!(fs::symlink_metadata(workdir.join("Alias.java")).unwrap().is_file());
    }

    #[test]
    fn test_execute_with_no_stages_is_not_attempted() {
        let fx = fixture();
        let config = config(&fx, ExecutionTarget::Simulator);
        let mut invoker = ScriptedInvoker::new();
        let mut engine = ExecutionEngine::new(
            &config,
            &fx.layout,
            "",
            &mut invoker,
            LocalFixtureProvider::new(&fx.sources),
        );
        let mut command = ToolCommand::new();
        command.set(ToolOption::Debug);
        let outcome = engine
            .execute("unit", &command, &StagePlan::Staged(Vec::new()))
            .unwrap();
        assert_eq!(outcome, UnitOutcome::NotAttempted);
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn test_fixture_errors_are_fatal() {
        let fx = fixture();
        let cat = Catalogue::from_json_str(CATALOGUE).unwrap();
        let config = config(&fx, ExecutionTarget::Device);
        let plan = compile(&cat, &config).unwrap();

        let mut engine = ExecutionEngine::new(
            &config,
            &fx.layout,
            "",
            ScriptedInvoker::new(),
            LocalFixtureProvider::new(fx.sources.join("missing")),
        );
        let err = engine.run(&plan).unwrap_err();
        assert!(matches!(err, HarnessError::Clone { .. }));
    }
}
