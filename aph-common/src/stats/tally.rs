//! Second pass: count, per symbol, the projects that use it.

use super::key::SymbolKey;
use super::merge::PROJECT_HEADER;
use std::collections::{HashMap, HashSet};

/// Number of distinct projects per symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolCounts {
    counts: HashMap<SymbolKey, usize>,
}

impl SymbolCounts {
    /// Count usages in a merged report.
    ///
    /// Projects are delimited by `# Applet:` headers; a symbol listed several
    /// times inside one project counts once. Comment lines, blank lines and
    /// lines that are not usage records are ignored.
    pub fn from_merged(merged: &str) -> Self {
        let mut counts = Self::default();
        let mut project: HashSet<SymbolKey> = HashSet::new();

        for line in merged.lines() {
            if line.starts_with(PROJECT_HEADER) {
                counts.add_project(project.drain());
                continue;
            }
            let line = line.trim_end();
            if line.trim_start().is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(key) = SymbolKey::from_usage_record(line) {
                project.insert(key);
            }
        }
        counts.add_project(project.drain());
        counts
    }

    /// Count one project's symbols; duplicates are ignored.
    pub fn add_project(&mut self, symbols: impl IntoIterator<Item = SymbolKey>) {
        let distinct: HashSet<SymbolKey> = symbols.into_iter().collect();
        for key in distinct {
            *self.counts.entry(key).or_default() += 1;
        }
    }

    pub fn get(&self, key: &SymbolKey) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Remove `key`, returning its count (0 if absent).
    pub fn take(&mut self, key: &SymbolKey) -> usize {
        self.counts.remove(key).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries ordered by serialised key.
    pub fn sorted(&self) -> Vec<(String, &SymbolKey, usize)> {
        let mut entries: Vec<_> = self
            .counts
            .iter()
            .map(|(key, count)| (key.to_string(), key, *count))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
