//! `APH_*` environment overrides.
//!
//! Problems are collected rather than returned one at a time, so a single
//! run reports every bad variable.

use super::source::Sourced;
use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("{var}='{value}' is not {expected}")]
    Malformed {
        var: String,
        value: String,
        expected: &'static str,
    },

    #[error("{var}={value} is outside {min}..={max}")]
    OutOfRange {
        var: String,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("{var}='{value}' is not a log level (trace, debug, info, warn, error, off)")]
    UnknownLevel { var: String, value: String },
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Reader for `APH_*` variables that records every malformed value.
#[derive(Debug, Default)]
pub struct EnvParser {
    problems: Vec<EnvError>,
}

impl EnvParser {
    pub const PREFIX: &'static str = "APH_";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> &[EnvError] {
        &self.problems
    }

    /// Hand back everything recorded so far, or `Ok` if nothing was wrong.
    pub fn finish(&mut self) -> Result<(), Vec<EnvError>> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.problems))
        }
    }

    /// `(APH_<key>, value)`, treating an empty value as unset.
    fn lookup(key: &str) -> Option<(String, String)> {
        let var = format!("{}{key}", Self::PREFIX);
        env::var(&var)
            .ok()
            .filter(|value| !value.is_empty())
            .map(|value| (var, value))
    }

    pub fn string(&mut self, key: &str) -> Option<Sourced<String>> {
        Self::lookup(key).map(|(var, value)| Sourced::from_env(value, var))
    }

    pub fn path(&mut self, key: &str) -> Option<Sourced<PathBuf>> {
        Self::lookup(key).map(|(var, value)| Sourced::from_env(PathBuf::from(value), var))
    }

    pub fn u32_in(&mut self, key: &str, range: RangeInclusive<u32>) -> Option<Sourced<u32>> {
        let (var, raw) = Self::lookup(key)?;
        let Ok(value) = raw.trim().parse::<u32>() else {
            self.problems.push(EnvError::Malformed {
                var,
                value: raw,
                expected: "a non-negative integer",
            });
            return None;
        };
        if !range.contains(&value) {
            self.problems.push(EnvError::OutOfRange {
                var,
                value,
                min: *range.start(),
                max: *range.end(),
            });
            return None;
        }
        Some(Sourced::from_env(value, var))
    }

    /// Level name in lower case; an unknown name is recorded and `default` used.
    pub fn log_level(&mut self, key: &str, default: &str) -> Sourced<String> {
        let Some((var, raw)) = Self::lookup(key) else {
            return Sourced::default_value(default.to_string());
        };
        let level = raw.to_ascii_lowercase();
        if LEVELS.contains(&level.as_str()) {
            return Sourced::from_env(level, var);
        }
        self.problems.push(EnvError::UnknownLevel {
            var: var.clone(),
            value: raw,
        });
        Sourced::from_env(default.to_string(), var)
    }
}
