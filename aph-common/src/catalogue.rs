//! Test catalogue: descriptors of the applets the profiler is exercised on.
//!
//! The on-disk shape (camelCase JSON, or TOML with the same keys) is parsed
//! into `Raw*` structs and then validated into the typed model once. Nothing
//! downstream re-checks mutual exclusions.

use crate::errors::{HarnessError, Result};
use crate::types::{Platform, Stage};
use crate::version::ToolkitVersion;
use regex::Regex;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loaded and validated catalogue.
#[derive(Debug, Clone)]
pub struct Catalogue {
    pub auxiliary: AuxiliarySources,
    pub tests: Vec<TestDescriptor>,
}

/// Locations of shared repositories and downloads used by many descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliarySources {
    #[serde(default)]
    pub jckit_repo: Option<String>,
    #[serde(default)]
    pub etsi_repo: Option<String>,
    #[serde(default)]
    pub gpapi_repo: Option<String>,
    #[serde(default)]
    pub thoth_repo: Option<String>,
    #[serde(default)]
    pub visa_jar: Option<String>,
}

/// Where a descriptor's sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Repo(String),
    Archive(String),
}

impl SourceLocation {
    pub fn url(&self) -> &str {
        match self {
            Self::Repo(url) | Self::Archive(url) => url,
        }
    }
}

/// Explicit per-OS enable flags. `None` means enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformFlags {
    pub linux: Option<bool>,
    pub windows: Option<bool>,
    pub darwin: Option<bool>,
}

impl PlatformFlags {
    pub fn enabled_on(&self, platform: Platform) -> bool {
        let flag = match platform {
            Platform::Linux => self.linux,
            Platform::Windows => self.windows,
            Platform::Darwin => self.darwin,
        };
        flag.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MoveEdit {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Regex replacement applied to glob-selected files.
#[derive(Debug, Clone)]
pub struct Fixup {
    pub pattern: Regex,
    pub replacement: String,
    pub files: Vec<String>,
    /// Only applied when running against a physical card.
    pub card_only: bool,
}

/// Source edits, applied in field order: moves, removals, fixups.
#[derive(Debug, Clone, Default)]
pub struct SourceEdits {
    pub moves: Vec<MoveEdit>,
    pub removals: Vec<String>,
    pub fixups: Vec<Fixup>,
}

impl SourceEdits {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.removals.is_empty() && self.fixups.is_empty()
    }
}

/// A known failure: the pipeline works only up to `stop_after`, if recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredFailure {
    #[serde(default)]
    pub stop_after: Option<Stage>,
}

/// Reset instruction and class byte forwarded to the profiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    pub reset_ins: Option<String>,
    pub cla: Option<String>,
}

/// Auxiliary API jars a descriptor needs on the class path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryApis {
    pub etsi: Option<String>,
    pub gppro: Option<String>,
    pub thoth: Option<String>,
    pub visa: bool,
}

/// Input given to one profiled method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    /// Inline regex describing the data in hex.
    Pattern(String),
    /// File with one hex input per line.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtest {
    pub name: String,
    pub executable: String,
    pub input: InputSpec,
    pub ins: Option<String>,
    pub p1: Option<String>,
    pub p2: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub selectors: Selectors,
    pub failure: Option<DeclaredFailure>,
    pub min_toolkit: Option<ToolkitVersion>,
    pub max_toolkit: Option<ToolkitVersion>,
    pub subtests: Vec<Subtest>,
}

/// Flat subtests, or independent entry points each owning their subtests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    Plain(Vec<Subtest>),
    WithEntryPoints(Vec<EntryPoint>),
}

#[derive(Debug, Clone)]
pub struct TestDescriptor {
    pub name: String,
    pub source: SourceLocation,
    pub path: PathBuf,
    pub min_toolkit: ToolkitVersion,
    pub max_toolkit: Option<ToolkitVersion>,
    pub platforms: PlatformFlags,
    pub edits: SourceEdits,
    pub failure: Option<DeclaredFailure>,
    pub selectors: Selectors,
    pub auxiliary: AuxiliaryApis,
    pub layout: Layout,
}

impl TestDescriptor {
    /// Filesystem-safe form of the name.
    pub fn slug(&self) -> String {
        self.name.replace(' ', "_")
    }

    pub fn entry_points(&self) -> &[EntryPoint] {
        match &self.layout {
            Layout::Plain(_) => &[],
            Layout::WithEntryPoints(entry_points) => entry_points,
        }
    }

    /// True if any subtest exists at any nesting level.
    pub fn has_subtests(&self) -> bool {
        match &self.layout {
            Layout::Plain(subtests) => !subtests.is_empty(),
            Layout::WithEntryPoints(entry_points) => {
                entry_points.iter().any(|ep| !ep.subtests.is_empty())
            }
        }
    }

    fn matches_filter(&self, terms: &[String]) -> bool {
        let name = self.name.to_lowercase();
        terms.iter().any(|term| name.contains(&term.to_lowercase()))
    }
}

impl Catalogue {
    /// Load a catalogue; `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::CatalogueRead {
            path: path.to_path_buf(),
            source,
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let catalogue = if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
        .map_err(|err| match err {
            HarnessError::CatalogueParse { message, .. } => HarnessError::CatalogueParse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        debug!(
            path = %path.display(),
            tests = catalogue.tests.len(),
            "Loaded catalogue"
        );
        Ok(catalogue)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: RawCatalogue =
            serde_json::from_str(text).map_err(|err| HarnessError::CatalogueParse {
                path: PathBuf::new(),
                message: err.to_string(),
            })?;
        raw.validate()
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawCatalogue = toml::from_str(text).map_err(|err| HarnessError::CatalogueParse {
            path: PathBuf::new(),
            message: err.to_string(),
        })?;
        raw.validate()
    }

    /// Descriptors whose name contains any term (case-insensitive).
    ///
    /// No terms selects everything; terms that select nothing are an error.
    pub fn select(&self, terms: &[String]) -> Result<Vec<&TestDescriptor>> {
        if terms.is_empty() {
            return Ok(self.tests.iter().collect());
        }
        let selected: Vec<_> = self
            .tests
            .iter()
            .filter(|test| test.matches_filter(terms))
            .collect();
        if selected.is_empty() {
            return Err(HarnessError::EmptyFilter {
                filter: terms.to_vec(),
            });
        }
        Ok(selected)
    }
}

// -----------------------------------------------------------------------------
// On-disk shape
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawCatalogue {
    #[serde(flatten)]
    auxiliary: AuxiliarySources,
    #[serde(default)]
    tests: Vec<RawDescriptor>,
}

impl RawCatalogue {
    fn validate(self) -> Result<Catalogue> {
        let mut seen = HashSet::new();
        let mut tests = Vec::with_capacity(self.tests.len());
        for raw in self.tests {
            let descriptor = raw.validate()?;
            if !seen.insert(descriptor.slug()) {
                return Err(invalid(&descriptor.name, "duplicate test name"));
            }
            tests.push(descriptor);
        }
        Ok(Catalogue {
            auxiliary: self.auxiliary,
            tests,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    name: String,
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    archive: Option<String>,
    #[serde(default)]
    path: PathBuf,
    jckit: ToolkitVersion,
    #[serde(default)]
    max_jckit: Option<ToolkitVersion>,
    #[serde(default)]
    linux: Option<bool>,
    #[serde(default)]
    windows: Option<bool>,
    #[serde(default)]
    darwin: Option<bool>,
    #[serde(default, rename = "move")]
    moves: Vec<MoveEdit>,
    #[serde(default)]
    remove: Vec<String>,
    #[serde(default)]
    fixup: Vec<RawFixup>,
    #[serde(default)]
    failure: Option<DeclaredFailure>,
    #[serde(default)]
    reset_ins: Option<String>,
    #[serde(default)]
    cla: Option<String>,
    #[serde(default)]
    subtests: Option<Vec<RawSubtest>>,
    #[serde(default)]
    entry_points: Option<Vec<RawEntryPoint>>,
    #[serde(default)]
    etsi: Option<String>,
    #[serde(default)]
    gppro: Option<String>,
    #[serde(default)]
    thoth: Option<String>,
    #[serde(default)]
    visa: Option<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFixup {
    pattern: String,
    replacement: String,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    card_only: Option<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntryPoint {
    name: String,
    #[serde(default)]
    reset_ins: Option<String>,
    #[serde(default)]
    cla: Option<String>,
    #[serde(default)]
    failure: Option<DeclaredFailure>,
    #[serde(default)]
    jckit: Option<ToolkitVersion>,
    #[serde(default)]
    max_jckit: Option<ToolkitVersion>,
    #[serde(default)]
    subtests: Vec<RawSubtest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSubtest {
    #[serde(default)]
    name: Option<String>,
    executable: String,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    input_file: Option<PathBuf>,
    #[serde(default)]
    ins: Option<String>,
    #[serde(default)]
    p1: Option<String>,
    #[serde(default)]
    p2: Option<String>,
}

fn invalid(name: &str, reason: impl Into<String>) -> HarnessError {
    HarnessError::InvalidDescriptor {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn check_bounds(
    name: &str,
    min: Option<&ToolkitVersion>,
    max: Option<&ToolkitVersion>,
) -> Result<()> {
    if let (Some(min), Some(max)) = (min, max)
        && max < min
    {
        return Err(invalid(
            name,
            format!("maxJckit {max} is older than jckit {min}"),
        ));
    }
    Ok(())
}

impl RawDescriptor {
    fn validate(self) -> Result<TestDescriptor> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(invalid("<unnamed>", "empty name"));
        }

        let source = match (self.repo, self.archive) {
            (Some(repo), None) => SourceLocation::Repo(repo),
            (None, Some(archive)) => SourceLocation::Archive(archive),
            (Some(_), Some(_)) => {
                return Err(invalid(&name, "`repo` and `archive` are mutually exclusive"));
            }
            (None, None) => return Err(invalid(&name, "no sources: set `repo` or `archive`")),
        };

        check_bounds(&name, Some(&self.jckit), self.max_jckit.as_ref())?;

        let layout = match (self.subtests, self.entry_points) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    &name,
                    "`subtests` and `entryPoints` are mutually exclusive",
                ));
            }
            (Some(subtests), None) => Layout::Plain(validate_subtests(&name, subtests)?),
            (None, Some(entry_points)) => {
                let mut names = HashSet::new();
                let mut validated = Vec::with_capacity(entry_points.len());
                for ep in entry_points {
                    if !names.insert(ep.name.clone()) {
                        return Err(invalid(&name, format!("duplicate entry point `{}`", ep.name)));
                    }
                    let context = format!("{name} {}", ep.name);
                    check_bounds(&context, ep.jckit.as_ref(), ep.max_jckit.as_ref())?;
                    validated.push(EntryPoint {
                        subtests: validate_subtests(&context, ep.subtests)?,
                        name: ep.name,
                        selectors: Selectors {
                            reset_ins: ep.reset_ins,
                            cla: ep.cla,
                        },
                        failure: ep.failure,
                        min_toolkit: ep.jckit,
                        max_toolkit: ep.max_jckit,
                    });
                }
                Layout::WithEntryPoints(validated)
            }
            (None, None) => Layout::Plain(Vec::new()),
        };

        let mut fixups = Vec::with_capacity(self.fixup.len());
        for raw in self.fixup {
            let pattern = regex::RegexBuilder::new(&raw.pattern)
                .multi_line(true)
                .build()
                .map_err(|err| invalid(&name, format!("bad fixup pattern: {err}")))?;
            fixups.push(Fixup {
                pattern,
                replacement: translate_replacement(&raw.replacement),
                files: raw.files,
                card_only: raw.card_only.is_some(),
            });
        }

        Ok(TestDescriptor {
            source,
            path: self.path,
            min_toolkit: self.jckit,
            max_toolkit: self.max_jckit,
            platforms: PlatformFlags {
                linux: self.linux,
                windows: self.windows,
                darwin: self.darwin,
            },
            edits: SourceEdits {
                moves: self.moves,
                removals: self.remove,
                fixups,
            },
            failure: self.failure,
            selectors: Selectors {
                reset_ins: self.reset_ins,
                cla: self.cla,
            },
            auxiliary: AuxiliaryApis {
                etsi: self.etsi,
                gppro: self.gppro,
                thoth: self.thoth,
                visa: self.visa.is_some(),
            },
            layout,
            name,
        })
    }
}

/// Rewrite a `\1` / `\g<name>` style replacement into `regex` syntax.
///
/// Literal `$` is escaped so it is never read as a group reference.
fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let name: String = chars.by_ref().take_while(|c| *c != '>').collect();
                        out.push_str(&format!("${{{name}}}"));
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

fn validate_subtests(context: &str, raw: Vec<RawSubtest>) -> Result<Vec<Subtest>> {
    raw.into_iter()
        .map(|subtest| {
            let input = match (subtest.input, subtest.input_file) {
                (Some(pattern), None) => InputSpec::Pattern(pattern),
                (None, Some(file)) => InputSpec::File(file),
                (Some(_), Some(_)) => {
                    return Err(invalid(
                        context,
                        format!(
                            "subtest `{}`: `input` and `inputFile` are mutually exclusive",
                            subtest.executable
                        ),
                    ));
                }
                (None, None) => {
                    return Err(invalid(
                        context,
                        format!(
                            "subtest `{}`: one of `input`/`inputFile` is required",
                            subtest.executable
                        ),
                    ));
                }
            };
            Ok(Subtest {
                name: subtest.name.unwrap_or_else(|| subtest.executable.clone()),
                executable: subtest.executable,
                input,
                ins: subtest.ins,
                p1: subtest.p1,
                p2: subtest.p2,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "jckitRepo": "https://example.org/jckit.git",
        "visaJar": "https://example.org/visa.jar",
        "tests": [
            {
                "name": "Hello World",
                "repo": "https://example.org/hello.git",
                "path": "src",
                "jckit": "222",
                "windows": false,
                "fixup": [
                    {"pattern": "^import foo;$", "replacement": "", "files": ["**/*.java"], "cardOnly": true}
                ],
                "subtests": [
                    {"name": "echo", "executable": "process", "input": "00a4[0-9a-f]{4}", "ins": "01"}
                ]
            },
            {
                "name": "Wallet",
                "archive": "https://example.org/wallet.zip",
                "path": "wallet/src",
                "jckit": 304,
                "entryPoints": [
                    {"name": "wallet.Main", "cla": "80", "subtests": []},
                    {"name": "wallet.Loyalty", "failure": {"stopAfter": "compilation"},
                     "subtests": [{"executable": "credit", "inputFile": "inputs/credit.txt"}]}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parses_both_layouts() {
        let catalogue = Catalogue::from_json_str(SAMPLE).unwrap();
        assert_eq!(catalogue.tests.len(), 2);
        assert_eq!(
            catalogue.auxiliary.jckit_repo.as_deref(),
            Some("https://example.org/jckit.git")
        );

        let hello = &catalogue.tests[0];
        assert_eq!(hello.slug(), "Hello_World");
        assert!(!hello.platforms.enabled_on(Platform::Windows));
        assert!(hello.platforms.enabled_on(Platform::Linux));
        assert!(hello.edits.fixups[0].card_only);
        match &hello.layout {
            Layout::Plain(subtests) => {
                assert_eq!(subtests.len(), 1);
                assert_eq!(subtests[0].input, InputSpec::Pattern("00a4[0-9a-f]{4}".into()));
            }
            other => panic!("unexpected layout {other:?}"),
        }

        let wallet = &catalogue.tests[1];
        assert_eq!(wallet.min_toolkit.as_str(), "304");
        assert_eq!(wallet.entry_points().len(), 2);
        let loyalty = &wallet.entry_points()[1];
        assert_eq!(
            loyalty.failure,
            Some(DeclaredFailure {
                stop_after: Some(Stage::Compilation)
            })
        );
        assert_eq!(loyalty.subtests[0].name, "credit");
        assert!(wallet.has_subtests());
    }

    #[test]
    fn test_rejects_both_layouts() {
        let text = r#"{"tests": [{"name": "x", "repo": "r", "jckit": "222",
            "subtests": [], "entryPoints": []}]}"#;
        let err = Catalogue::from_json_str(text).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidDescriptor { .. }));
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_rejects_missing_or_double_input() {
        let neither = r#"{"tests": [{"name": "x", "repo": "r", "jckit": "222",
            "subtests": [{"executable": "m"}]}]}"#;
        assert!(Catalogue::from_json_str(neither).is_err());

        let both = r#"{"tests": [{"name": "x", "repo": "r", "jckit": "222",
            "subtests": [{"executable": "m", "input": "00", "inputFile": "f"}]}]}"#;
        assert!(Catalogue::from_json_str(both).is_err());
    }

    #[test]
    fn test_rejects_missing_sources() {
        let text = r#"{"tests": [{"name": "x", "jckit": "222"}]}"#;
        let err = Catalogue::from_json_str(text).unwrap_err();
        assert!(err.to_string().contains("no sources"));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let text = r#"{"tests": [{"name": "x", "repo": "r", "jckit": "310", "maxJckit": "222"}]}"#;
        assert!(Catalogue::from_json_str(text).is_err());
    }

    #[test]
    fn test_rejects_bad_fixup_regex() {
        let text = r#"{"tests": [{"name": "x", "repo": "r", "jckit": "222",
            "fixup": [{"pattern": "(", "replacement": ""}]}]}"#;
        assert!(Catalogue::from_json_str(text).is_err());
    }

    #[test]
    fn test_select_is_case_insensitive_substring() {
        let catalogue = Catalogue::from_json_str(SAMPLE).unwrap();
        let selected = catalogue.select(&["WALL".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Wallet");

        assert_eq!(catalogue.select(&[]).unwrap().len(), 2);

        let err = catalogue.select(&["missing".to_string()]).unwrap_err();
        assert!(matches!(err, HarnessError::EmptyFilter { .. }));
    }

    #[test]
    fn test_replacement_translation() {
        assert_eq!(translate_replacement(r"\1 = \g<value>;"), "${1} = ${value};");
        assert_eq!(translate_replacement("cost: $5"), "cost: $$5");
        assert_eq!(translate_replacement(r"a\nb\\c"), "a\nb\\c");

        let text = r#"{"tests": [{"name": "x", "repo": "r", "jckit": "222",
            "fixup": [{"pattern": "^(short) (\\w+);$", "replacement": "\\1 \\2 = 0;", "files": []}]}]}"#;
        let catalogue = Catalogue::from_json_str(text).unwrap();
        let fixup = &catalogue.tests[0].edits.fixups[0];
        assert_eq!(
            fixup.pattern.replace_all("short a;\nshort b;", fixup.replacement.as_str()),
            "short a = 0;\nshort b = 0;"
        );
    }

    #[test]
    fn test_toml_catalogue() {
        let text = r#"
jckitRepo = "https://example.org/jckit.git"

[[tests]]
name = "Toml Applet"
repo = "https://example.org/t.git"
path = "src"
jckit = "305u3"

[[tests.subtests]]
executable = "run"
input = "00"
"#;
        let catalogue = Catalogue::from_toml_str(text).unwrap();
        assert_eq!(catalogue.tests[0].min_toolkit.as_str(), "305u3");
    }
}
