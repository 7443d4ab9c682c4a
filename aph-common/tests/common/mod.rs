#![allow(dead_code)]

use aph_common::toolkit::ToolkitLayout;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub use aph_common::testing::init_test_logging;

#[ctor::ctor]
fn setup() {
    init_test_logging();
}

/// Scratch tree with applet sources, tool-kit layout and an output root.
pub struct Workspace {
    pub dir: TempDir,
    pub sources: PathBuf,
    pub output: PathBuf,
    pub layout: ToolkitLayout,
}

impl Workspace {
    pub fn new() -> Self {
        aph_common::test_log!("FIXTURE: Creating harness workspace");
        let dir = TempDir::new().expect("Failed to create temp dir");
        let sources = dir.path().join("sources");
        let output = dir.path().join("out");
        fs::create_dir_all(&sources).expect("Failed to create sources dir");
        let layout = ToolkitLayout::new(dir.path().join("jckit"), dir.path().join("aux"));
        Self {
            dir,
            sources,
            output,
            layout,
        }
    }

    /// Lay out `<sources>/<slug>/<module>/Applet.java`.
    pub fn add_applet(&self, slug: &str, module: &str) -> PathBuf {
        let module_dir = self.sources.join(slug).join(module);
        fs::create_dir_all(&module_dir).expect("Failed to create module dir");
        fs::write(
            module_dir.join("Applet.java"),
            "package demo;\n\npublic class Applet extends javacard.framework.Applet {}\n",
        )
        .expect("Failed to write Applet.java");
        module_dir
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Every directory directly below `dir` whose name starts with `prefix`.
pub fn dirs_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .collect();
    found.sort();
    found
}
