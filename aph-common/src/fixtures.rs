//! Source fixtures: fetching applet sources and applying declared edits.

use crate::catalogue::{AuxiliarySources, SourceEdits, SourceLocation, TestDescriptor};
use crate::errors::{HarnessError, Result};
use crate::run_config::RunConfig;
use crate::toolkit::ToolkitLayout;
use crate::types::{ExecutionTarget, RunMode};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Sent with every download; some hosts reject unknown agents.
pub const USER_AGENT: &str = "curl/8.1.2";

/// Which edits apply for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditPolicy {
    /// Statistics runs only relocate files.
    pub moves_only: bool,
    /// Apply fixups marked `cardOnly`.
    pub card_only_fixups: bool,
}

impl EditPolicy {
    pub fn for_run(config: &RunConfig) -> Self {
        Self {
            moves_only: config.mode == RunMode::Stats,
            card_only_fixups: config.target == ExecutionTarget::Device,
        }
    }
}

/// Materialises a descriptor's source tree.
pub trait FixtureProvider {
    /// Fetch and edit the sources, returning the tree root (not the module path).
    fn prepare(&mut self, descriptor: &TestDescriptor, policy: EditPolicy) -> Result<PathBuf>;
}

impl<T: FixtureProvider + ?Sized> FixtureProvider for &mut T {
    fn prepare(&mut self, descriptor: &TestDescriptor, policy: EditPolicy) -> Result<PathBuf> {
        (**self).prepare(descriptor, policy)
    }
}

/// Clones repositories and unpacks archives below `root`.
#[derive(Debug, Clone)]
pub struct GitFixtureProvider {
    root: PathBuf,
}

impl GitFixtureProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Fetch shared repositories and downloads that are not present yet.
    pub fn prepare_auxiliary(&self, sources: &AuxiliarySources, layout: &ToolkitLayout) -> Result<()> {
        let repos = [
            (&sources.jckit_repo, layout.toolkits_dir.clone()),
            (&sources.etsi_repo, layout.auxiliary_dir.join("etsiapi")),
            (&sources.gpapi_repo, layout.auxiliary_dir.join("gpapi")),
            (&sources.thoth_repo, layout.auxiliary_dir.join("thoth")),
        ];
        for (repo, target) in repos {
            if let Some(repo) = repo {
                clone_repo(repo, &target, false)?;
            }
        }
        if let Some(url) = &sources.visa_jar {
            download(url, &layout.visa_jar())?;
        }
        Ok(())
    }

    fn fetch(&self, descriptor: &TestDescriptor, target: &Path) -> Result<()> {
        match &descriptor.source {
            SourceLocation::Repo(url) => clone_repo(url, target, true),
            SourceLocation::Archive(url) => {
                let file_name = archive_file_name(url).ok_or_else(|| HarnessError::Download {
                    url: url.clone(),
                    message: "URL has no file name".to_string(),
                })?;
                let archive = self.root.join(file_name);
                download(url, &archive)?;
                remove_tree(target)?;
                unpack(&archive, target).map_err(|message| HarnessError::Download {
                    url: url.clone(),
                    message,
                })
            }
        }
    }
}

impl FixtureProvider for GitFixtureProvider {
    fn prepare(&mut self, descriptor: &TestDescriptor, policy: EditPolicy) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let target = self.root.join(descriptor.slug());
        self.fetch(descriptor, &target)?;
        apply_edits(&descriptor.name, &target, &descriptor.edits, policy)?;
        Ok(target)
    }
}

/// Shallow clone; an existing checkout is kept unless `reclone` is set.
fn clone_repo(url: &str, target: &Path, reclone: bool) -> Result<()> {
    if target.exists() && !reclone {
        debug!(target = %target.display(), "Using existing checkout");
        return Ok(());
    }
    let git = which::which("git").map_err(|err| HarnessError::Clone {
        repo: url.to_string(),
        message: err.to_string(),
    })?;
    remove_tree(target)?;

    info!(%url, target = %target.display(), "Cloning");
    let status = Command::new(git)
        .args(["clone", "--depth=1", url])
        .arg(target)
        .status()
        .map_err(|err| HarnessError::Clone {
            repo: url.to_string(),
            message: err.to_string(),
        })?;
    if !status.success() {
        return Err(HarnessError::Clone {
            repo: url.to_string(),
            message: format!("git exited with {status}"),
        });
    }
    Ok(())
}

/// Download `url` to `target` unless it already exists.
fn download(url: &str, target: &Path) -> Result<()> {
    if target.exists() {
        debug!(target = %target.display(), "Using cached download");
        return Ok(());
    }
    let failed = |message: String| HarnessError::Download {
        url: url.to_string(),
        message,
    };

    info!(%url, "Downloading");
    let response = ureq::get(url)
        .header("User-Agent", USER_AGENT)
        .call()
        .map_err(|err| failed(err.to_string()))?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    // Write to a sibling first so an interrupted download is never cached.
    let partial = target.with_extension("part");
    let mut file = fs::File::create(&partial)?;
    io::copy(&mut response.into_body().into_reader(), &mut file)
        .map_err(|err| failed(err.to_string()))?;
    fs::rename(&partial, target)?;
    Ok(())
}

/// Last path segment of a URL, without query or fragment.
fn archive_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

fn unpack(archive: &Path, target: &Path) -> std::result::Result<(), String> {
    fs::create_dir_all(target).map_err(|err| err.to_string())?;
    let is_zip = archive
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    let mut command = if is_zip {
        let unzip = which::which("unzip").map_err(|err| format!("unzip: {err}"))?;
        let mut command = Command::new(unzip);
        command.arg("-q").arg("-o").arg(archive).arg("-d").arg(target);
        command
    } else {
        let tar = which::which("tar").map_err(|err| format!("tar: {err}"))?;
        let mut command = Command::new(tar);
        command.arg("-xf").arg(archive).arg("-C").arg(target);
        command
    };
    let status = command.status().map_err(|err| err.to_string())?;
    if !status.success() {
        return Err(format!("unpacking {} exited with {status}", archive.display()));
    }
    Ok(())
}

/// Remove a file or directory tree, clearing read-only bits if needed.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if !metadata.is_dir() {
        return fs::remove_file(path);
    }
    if fs::remove_dir_all(path).is_ok() {
        return Ok(());
    }
    make_writable(path)?;
    fs::remove_dir_all(path)
}

#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        return Ok(());
    }
    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }
    if metadata.is_dir() {
        for entry in fs::read_dir(path)? {
            make_writable(&entry?.path())?;
        }
    }
    Ok(())
}

fn glob_under(root: &Path, pattern: &str) -> std::result::Result<Vec<PathBuf>, String> {
    let base = glob::Pattern::escape(&root.to_string_lossy());
    let full = format!("{base}/{pattern}");
    let paths = glob::glob(&full).map_err(|err| format!("bad glob `{pattern}`: {err}"))?;
    paths
        .map(|entry| entry.map_err(|err| err.to_string()))
        .collect()
}

/// Apply moves, then removals, then fixups to the tree at `root`.
pub fn apply_edits(name: &str, root: &Path, edits: &SourceEdits, policy: EditPolicy) -> Result<()> {
    let failed = |message: String| HarnessError::Edit {
        name: name.to_string(),
        message,
    };

    for edit in &edits.moves {
        let from = root.join(&edit.from);
        let to = root.join(&edit.to);
        debug!(from = %from.display(), to = %to.display(), "Moving");
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|err| failed(err.to_string()))?;
        }
        fs::rename(&from, &to)
            .map_err(|err| failed(format!("move {}: {err}", from.display())))?;
    }

    if policy.moves_only {
        return Ok(());
    }

    for pattern in &edits.removals {
        for path in glob_under(root, pattern).map_err(failed)? {
            debug!(path = %path.display(), "Removing");
            remove_tree(&path).map_err(|err| failed(format!("remove {}: {err}", path.display())))?;
        }
    }

    for fixup in &edits.fixups {
        if fixup.card_only && !policy.card_only_fixups {
            debug!(pattern = %fixup.pattern, "Skipping card-only fixup");
            continue;
        }
        for pattern in &fixup.files {
            for path in glob_under(root, pattern).map_err(failed)? {
                if !path.is_file() {
                    continue;
                }
                let bytes = fs::read(&path).map_err(|err| failed(err.to_string()))?;
                let text = String::from_utf8_lossy(&bytes);
                let replaced = fixup.pattern.replace_all(&text, fixup.replacement.as_str());
                if replaced != text {
                    debug!(path = %path.display(), pattern = %fixup.pattern, "Applying fixup");
                    fs::write(&path, replaced.as_bytes()).map_err(|err| failed(err.to_string()))?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::Catalogue;

    fn descriptor() -> TestDescriptor {
        let catalogue = Catalogue::from_json_str(
            r#"{"tests": [{"name": "Edits", "repo": "r", "jckit": "222",
                "move": [{"from": "old/A.java", "to": "src/pkg/A.java"}],
                "remove": ["src/**/*.orig"],
                "fixup": [
                    {"pattern": "^import legacy\\.\\*;$", "replacement": "", "files": ["src/**/*.java"]},
                    {"pattern": "SIMULATOR", "replacement": "CARD", "files": ["src/**/*.java"], "cardOnly": true}
                ]}]}"#,
        )
        .unwrap();
        catalogue.tests.into_iter().next().unwrap()
    }

    fn seed(root: &Path) {
        fs::create_dir_all(root.join("old")).unwrap();
        fs::create_dir_all(root.join("src/pkg")).unwrap();
        fs::write(
            root.join("old/A.java"),
            "import legacy.*;\nclass A { int m = SIMULATOR; }\n",
        )
        .unwrap();
        fs::write(root.join("src/pkg/B.java.orig"), "stale").unwrap();
    }

    #[test]
    fn test_edits_in_order_on_simulator() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let test = descriptor();

        apply_edits(&test.name, dir.path(), &test.edits, EditPolicy::default()).unwrap();

        let moved = fs::read_to_string(dir.path().join("src/pkg/A.java")).unwrap();
        assert_eq!(moved, "\nclass A { int m = SIMULATOR; }\n");
        assert!(!dir.path().join("old/A.java").exists());
        assert!(!dir.path().join("src/pkg/B.java.orig").exists());
    }

    #[test]
    fn test_card_only_fixups_apply_on_device() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let test = descriptor();
        let policy = EditPolicy {
            moves_only: false,
            card_only_fixups: true,
        };
        apply_edits(&test.name, dir.path(), &test.edits, policy).unwrap();
        let moved = fs::read_to_string(dir.path().join("src/pkg/A.java")).unwrap();
        assert!(moved.contains("CARD"));
    }

    #[test]
    fn test_stats_only_moves() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let test = descriptor();
        let policy = EditPolicy {
            moves_only: true,
            card_only_fixups: false,
        };
        apply_edits(&test.name, dir.path(), &test.edits, policy).unwrap();
        let moved = fs::read_to_string(dir.path().join("src/pkg/A.java")).unwrap();
        assert!(moved.starts_with("import legacy.*;"));
        assert!(dir.path().join("src/pkg/B.java.orig").exists());
    }

    #[test]
    fn test_failed_move_is_an_edit_error() {
        let dir = tempfile::tempdir().unwrap();
        let test = descriptor();
        let err = apply_edits(&test.name, dir.path(), &test.edits, EditPolicy::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::Edit { .. }));
    }

    #[test]
    fn test_policy_follows_run() {
        let stats = EditPolicy::for_run(&RunConfig::new(RunMode::Stats));
        assert!(stats.moves_only);
        assert!(!stats.card_only_fixups);
        let device =
            EditPolicy::for_run(&RunConfig::new(RunMode::Time).with_target(ExecutionTarget::Device));
        assert!(!device.moves_only);
        assert!(device.card_only_fixups);
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("https://example.org/dl/applet-1.2.zip?raw=1"),
            Some("applet-1.2.zip")
        );
        assert_eq!(archive_file_name("https://example.org/"), None);
    }

    #[test]
    fn test_remove_tree_handles_missing_and_files() {
        let dir = tempfile::tempdir().unwrap();
        remove_tree(&dir.path().join("missing")).unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        remove_tree(&file).unwrap();
        assert!(!file.exists());
        fs::create_dir_all(dir.path().join("d/e")).unwrap();
        remove_tree(&dir.path().join("d")).unwrap();
        assert!(!dir.path().join("d").exists());
    }
}
