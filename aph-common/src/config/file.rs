//! Optional `aph.toml` harness file.

use crate::errors::{HarnessError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "aph.toml";

/// Every key is optional; unset keys fall through to environment or defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessFile {
    pub catalogue: Option<PathBuf>,
    pub fixtures_dir: Option<PathBuf>,
    pub toolkits_dir: Option<PathBuf>,
    pub auxiliary_dir: Option<PathBuf>,
    pub manifests_dir: Option<PathBuf>,
    pub java: Option<PathBuf>,
    pub javac: Option<PathBuf>,
    pub profiler_jar: Option<PathBuf>,
    pub repeat_count: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub stats_dir: Option<PathBuf>,
}

impl HarnessFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|err| HarnessError::ConfigFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| HarnessError::ConfigFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(&text, path)
    }

    /// Load `explicit` if given, else `aph.toml` in `cwd` if it exists.
    ///
    /// Returns the path actually read alongside the contents.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Option<(PathBuf, Self)>> {
        if let Some(path) = explicit {
            return Ok(Some((path.to_path_buf(), Self::load(path)?)));
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            let file = Self::load(&candidate)?;
            return Ok(Some((candidate, file)));
        }
        Ok(None)
    }
}
