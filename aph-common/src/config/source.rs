//! Where a configuration value came from.

use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    Cli,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::File => "file",
            Self::Environment => "environment",
            Self::Cli => "command line",
        };
        f.write_str(name)
    }
}

/// A value paired with its origin, for `--verbose` diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    /// Variable name or file path the value was read from.
    pub origin: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            origin: None,
        }
    }

    pub fn from_env(value: T, var_name: String) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            origin: Some(var_name),
        }
    }

    pub fn from_file(value: T, path: &Path) -> Self {
        Self {
            value,
            source: ConfigSource::File,
            origin: Some(path.display().to_string()),
        }
    }

    pub fn from_cli(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Cli,
            origin: None,
        }
    }

    pub fn is_default(&self) -> bool {
        self.source == ConfigSource::Default
    }

    /// Replace the value if `other` is set, keeping track of the new source.
    pub fn override_with(self, other: Option<Sourced<T>>) -> Self {
        other.unwrap_or(self)
    }
}
