//! Test doubles for the execution engine and shared test logging.
//!
//! The engine only talks to the outside world through [`ToolInvoker`] and
//! [`FixtureProvider`]; the types here stand in for Java and git so that
//! whole runs can be exercised from unit and integration tests.

use crate::catalogue::TestDescriptor;
use crate::errors::{HarnessError, Result};
use crate::fixtures::{EditPolicy, FixtureProvider, apply_edits};
use crate::invoker::ToolInvoker;
use crate::stages::Invocation;
use std::path::PathBuf;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TEST_LOGGING_INIT: Once = Once::new();

/// Route `tracing` output through the libtest writer. Safe to call repeatedly.
pub fn init_test_logging() {
    TEST_LOGGING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("APH_TEST_LOG")
            .unwrap_or_else(|_| EnvFilter::new("aph_common=debug,aph=debug,test=info"));
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(filter)
            .try_init();
    });
}

/// Log a line under the `test` target.
#[macro_export]
macro_rules! test_log {
    ($($arg:tt)*) => {
        tracing::info!(target: "test", $($arg)*);
    };
}

type Rule = Box<dyn Fn(&Invocation) -> bool + Send>;

/// Fake profiler: records every invocation and answers from scripted rules.
///
/// The first matching rule decides the exit code; no match means success.
#[derive(Default)]
pub struct ScriptedInvoker {
    rules: Vec<(Rule, i32)>,
    calls: Vec<Invocation>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `code` for invocations matching `predicate`.
    pub fn fail_when(
        mut self,
        predicate: impl Fn(&Invocation) -> bool + Send + 'static,
        code: i32,
    ) -> Self {
        self.rules.push((Box::new(predicate), code));
        self
    }

    /// Fail every invocation whose argument vector contains `arg`.
    pub fn fail_on_arg(self, arg: &str, code: i32) -> Self {
        let arg = arg.to_string();
        self.fail_when(move |inv| inv.args.iter().any(|a| *a == *arg), code)
    }

    pub fn calls(&self) -> &[Invocation] {
        &self.calls
    }

    /// Distinct `--work-dir` values, in first-seen order.
    pub fn workdirs(&self) -> Vec<PathBuf> {
        let mut seen = Vec::new();
        for call in &self.calls {
            let dir = call
                .args
                .windows(2)
                .find(|pair| pair[0] == "--work-dir")
                .map(|pair| PathBuf::from(&pair[1]));
            if let Some(dir) = dir
                && !seen.contains(&dir)
            {
                seen.push(dir);
            }
        }
        seen
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn invoke(&mut self, invocation: &Invocation) -> Result<i32> {
        let code = self
            .rules
            .iter()
            .find(|(predicate, _)| predicate(invocation))
            .map_or(0, |(_, code)| *code);
        self.calls.push(invocation.clone());
        Ok(code)
    }
}

/// Serves sources from `<root>/<descriptor slug>` and applies edits in place.
#[derive(Debug, Clone)]
pub struct LocalFixtureProvider {
    root: PathBuf,
    prepared: Vec<String>,
}

impl LocalFixtureProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prepared: Vec::new(),
        }
    }

    /// Names of the descriptors prepared so far, in order.
    pub fn prepared(&self) -> &[String] {
        &self.prepared
    }
}

impl FixtureProvider for LocalFixtureProvider {
    fn prepare(&mut self, descriptor: &TestDescriptor, policy: EditPolicy) -> Result<PathBuf> {
        let target = self.root.join(descriptor.slug());
        if !target.is_dir() {
            return Err(HarnessError::Clone {
                repo: descriptor.source.url().to_string(),
                message: format!("no local fixture at {}", target.display()),
            });
        }
        apply_edits(&descriptor.name, &target, &descriptor.edits, policy)?;
        self.prepared.push(descriptor.name.clone());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{StageScope, ToolCommand, ToolOption};

    fn invocation(workdir: &str, executable: &str) -> Invocation {
        let mut command = ToolCommand::new();
        command
            .set(ToolOption::WorkDir(workdir.into()))
            .set(ToolOption::Executable(executable.to_string()));
        command.render(StageScope::Unbounded)
    }

    #[test]
    fn test_scripted_invoker_first_rule_wins() {
        init_test_logging();
        let mut invoker = ScriptedInvoker::new()
            .fail_on_arg("sign", 3)
            .fail_when(|_| true, 9);

        assert_eq!(invoker.invoke(&invocation("/w1", "sign")).unwrap(), 3);
        assert_eq!(invoker.invoke(&invocation("/w2", "verify")).unwrap(), 9);
        assert_eq!(invoker.invoke(&invocation("/w2", "verify")).unwrap(), 9);
        assert_eq!(invoker.calls().len(), 3);
        assert_eq!(
            invoker.workdirs(),
            vec![PathBuf::from("/w1"), PathBuf::from("/w2")]
        );
        crate::test_log!("scripted invoker answered {} calls", invoker.calls().len());
    }

    #[test]
    fn test_default_invoker_succeeds() {
        let mut invoker = ScriptedInvoker::new();
        assert_eq!(invoker.invoke(&invocation("/w", "x")).unwrap(), 0);
    }
}
