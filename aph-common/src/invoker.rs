//! Tool invocation: running the external profiler for one stage.

use crate::errors::{HarnessError, Result};
use crate::stages::Invocation;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

/// Runs the profiler with a rendered argument vector and reports its exit code.
pub trait ToolInvoker {
    /// Exit code 0 means success. Errors are reserved for failing to run at all.
    fn invoke(&mut self, invocation: &Invocation) -> Result<i32>;
}

impl<T: ToolInvoker + ?Sized> ToolInvoker for &mut T {
    fn invoke(&mut self, invocation: &Invocation) -> Result<i32> {
        (**self).invoke(invocation)
    }
}

/// Launches `java -jar <profiler jar> <args...>` with inherited stdio.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    java: PathBuf,
    profiler_jar: PathBuf,
}

impl ProcessInvoker {
    pub fn new(java: impl Into<PathBuf>, profiler_jar: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            profiler_jar: profiler_jar.into(),
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.java);
        command
            .arg("-jar")
            .arg(&self.profiler_jar)
            .args(&invocation.args);
        command
    }
}

impl ToolInvoker for ProcessInvoker {
    fn invoke(&mut self, invocation: &Invocation) -> Result<i32> {
        if !self.profiler_jar.is_file() {
            return Err(HarnessError::MissingJar(self.profiler_jar.clone()));
        }
        debug!(java = %self.java.display(), jar = %self.profiler_jar.display(), "Launching profiler");
        let status = self
            .command(invocation)
            .status()
            .map_err(|source| HarnessError::Spawn {
                program: self.java.display().to_string(),
                source,
            })?;
        match status.code() {
            Some(code) => Ok(code),
            None => {
                warn!(%status, "Profiler terminated by signal");
                Ok(-1)
            }
        }
    }
}
