//! Third pass: known-library manifests and the per-manifest usage tables.
//!
//! A manifest lists library symbols grouped under `# ` section headers. For
//! type manifests the header is the package; for member manifests it is the
//! fully qualified owning type, split on its last `.` into package and type.
//! Rendering a manifest takes every listed symbol out of the corpus counts,
//! so whatever is left afterwards matched no manifest.

use super::key::SymbolKey;
use super::tally::SymbolCounts;
use std::fmt::{self, Write as _};

/// Header line that opens every generated table.
pub const COUNT_HEADER: &str = "# Number of projects that use the given symbol";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Constants,
    Types,
    Methods,
}

impl ManifestKind {
    /// Processing order; matters because each table consumes its keys.
    pub const ALL: [ManifestKind; 3] = [Self::Constants, Self::Types, Self::Methods];

    pub fn stem(self) -> &'static str {
        match self {
            Self::Constants => "constants",
            Self::Types => "types",
            Self::Methods => "methods",
        }
    }

    /// Manifest file name, e.g. `methods-in.txt`.
    pub fn input_file(self) -> String {
        format!("{}-in.txt", self.stem())
    }

    /// Table file name, e.g. `methods.txt`.
    pub fn output_file(self) -> String {
        format!("{}.txt", self.stem())
    }

    fn lists_members(self) -> bool {
        !matches!(self, Self::Types)
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Blank,
    Header(String),
    Symbol { text: String, key: SymbolKey },
}

/// A symbol listed before any section header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanSymbol {
    pub line: usize,
    pub text: String,
}

impl fmt::Display for OrphanSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: `{}` precedes any section header", self.line, self.text)
    }
}

impl std::error::Error for OrphanSymbol {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    kind: ManifestKind,
    lines: Vec<Line>,
}

impl Manifest {
    pub fn parse(kind: ManifestKind, text: &str) -> Result<Self, OrphanSymbol> {
        let mut lines = Vec::new();
        let mut section: Option<(String, String)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                lines.push(Line::Blank);
                continue;
            }
            if line.starts_with('#') {
                let name = line.strip_prefix("# ").unwrap_or(line);
                section = Some(if kind.lists_members() {
                    match name.rsplit_once('.') {
                        Some((package, owner)) => (package.to_string(), owner.to_string()),
                        None => (String::new(), name.to_string()),
                    }
                } else {
                    (name.to_string(), String::new())
                });
                lines.push(Line::Header(line.to_string()));
                continue;
            }
            let Some((package, owner)) = &section else {
                return Err(OrphanSymbol {
                    line: idx + 1,
                    text: line.to_string(),
                });
            };
            let key = if kind.lists_members() {
                SymbolKey::of_member(package.as_str(), owner.as_str(), line)
            } else {
                SymbolKey::of_type(package.as_str(), line)
            };
            lines.push(Line::Symbol {
                text: line.to_string(),
                key,
            });
        }

        Ok(Self { kind, lines })
    }

    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    /// Number of listed symbols.
    pub fn symbol_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line, Line::Symbol { .. }))
            .count()
    }

    /// Render the usage table, taking each listed symbol out of `counts`.
    ///
    /// Returns the table and the number of listed symbols used by at least
    /// one project.
    pub fn render(&self, counts: &mut SymbolCounts) -> (String, usize) {
        let mut out = format!("{COUNT_HEADER}\n\n");
        let mut used = 0;
        for line in &self.lines {
            match line {
                Line::Blank => out.push('\n'),
                Line::Header(header) => {
                    out.push_str(header);
                    out.push('\n');
                }
                Line::Symbol { text, key } => {
                    let count = counts.take(key);
                    if count > 0 {
                        used += 1;
                    }
                    // Infallible: writing into a String.
                    let _ = writeln!(out, "{text} - {count}");
                }
            }
        }
        (out, used)
    }
}

/// Table of the symbols no manifest claimed, sorted by key.
pub fn render_third_party(counts: &SymbolCounts) -> String {
    let mut out = format!("{COUNT_HEADER}\n# package,type[,member] - count\n\n");
    for (_, key, count) in counts.sorted() {
        let _ = writeln!(out, "{} - {count}", key.trimmed());
    }
    out
}
