//! Tool-kit installations, auxiliary API jars and the JDK compatibility probe.

use crate::catalogue::AuxiliaryApis;
use crate::errors::{HarnessError, Result};
use crate::version::ToolkitVersion;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Oldest tool-kit usable with JDK 9 to 11.
pub const JDK11_MIN_TOOLKIT: &str = "303";
/// Oldest tool-kit usable with JDK 12 and newer.
pub const JDK12_MIN_TOOLKIT: &str = "310r20210706";

/// Where tool-kits and auxiliary jars live on disk.
#[derive(Debug, Clone)]
pub struct ToolkitLayout {
    /// Directory holding `jc<version>_kit` installations.
    pub toolkits_dir: PathBuf,
    /// Directory holding the auxiliary API checkouts and downloads.
    pub auxiliary_dir: PathBuf,
}

impl ToolkitLayout {
    pub fn new(toolkits_dir: impl Into<PathBuf>, auxiliary_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolkits_dir: toolkits_dir.into(),
            auxiliary_dir: auxiliary_dir.into(),
        }
    }

    pub fn toolkit_path(&self, version: &ToolkitVersion) -> PathBuf {
        self.toolkits_dir.join(format!("jc{version}_kit"))
    }

    pub fn etsi_jar(&self, version: &str) -> PathBuf {
        self.auxiliary_dir
            .join("etsiapi")
            .join(version)
            .join("05.06.00")
            .join("java")
            .join("etsiapi.jar")
    }

    pub fn gppro_jar(&self, version: &str) -> PathBuf {
        self.auxiliary_dir
            .join("gpapi")
            .join(format!("org.globalplatform-{version}"))
            .join("gpapi-globalplatform.jar")
    }

    pub fn thoth_jar(&self) -> PathBuf {
        self.auxiliary_dir.join("thoth").join("thoth.jar")
    }

    pub fn visa_jar(&self) -> PathBuf {
        self.auxiliary_dir.join("visa.jar")
    }

    /// Resolve the class-path jars a descriptor asks for, in a fixed order.
    pub fn auxiliary_jars(&self, apis: &AuxiliaryApis) -> Result<Vec<PathBuf>> {
        let mut jars = Vec::new();
        if let Some(version) = &apis.etsi {
            jars.push(self.etsi_jar(version));
        }
        if let Some(version) = &apis.gppro {
            jars.push(self.gppro_jar(version));
        }
        if apis.thoth.is_some() {
            jars.push(self.thoth_jar());
        }
        if apis.visa {
            jars.push(self.visa_jar());
        }
        if let Some(missing) = jars.iter().find(|jar| !jar.is_file()) {
            return Err(HarnessError::MissingJar(missing.clone()));
        }
        Ok(jars)
    }
}

/// Tool-kit actually used: the descriptor's minimum, raised to the run minimum.
pub fn effective_toolkit<'a>(
    required: &'a ToolkitVersion,
    run_min: Option<&'a ToolkitVersion>,
) -> &'a ToolkitVersion {
    match run_min {
        Some(floor) if floor > required => floor,
        _ => required,
    }
}

/// Major version from `javac -version` output (`javac 17.0.2`, `javac 1.8.0_292`).
pub fn parse_javac_major(output: &str) -> Option<u32> {
    let version = output.split_whitespace().nth(1)?;
    version.split(['.', '-', '+', '_']).next()?.parse().ok()
}

/// Oldest tool-kit the given JDK can still build for, if it imposes one.
pub fn toolkit_floor_for_jdk(major: u32) -> Option<ToolkitVersion> {
    let floor = match major {
        0..=8 => return None,
        9..=11 => JDK11_MIN_TOOLKIT,
        _ => JDK12_MIN_TOOLKIT,
    };
    ToolkitVersion::new(floor).ok()
}

/// Run `javac -version` and derive the tool-kit floor of the installed JDK.
///
/// Returns the JDK major version alongside the floor.
pub fn probe_jdk_floor(javac: &Path) -> Result<Option<(u32, ToolkitVersion)>> {
    let output = Command::new(javac)
        .arg("-version")
        .output()
        .map_err(|err| HarnessError::Probe(format!("{}: {err}", javac.display())))?;
    if !output.status.success() {
        return Err(HarnessError::Probe(format!(
            "{} -version exited with {}",
            javac.display(),
            output.status
        )));
    }

    // Older javac prints to stderr, newer to stdout.
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let major = parse_javac_major(&text)
        .ok_or_else(|| HarnessError::Probe(format!("unrecognised output: {}", text.trim())))?;
    debug!(major, "Detected JDK");

    Ok(toolkit_floor_for_jdk(major).map(|floor| (major, floor)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ToolkitVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_javac_major() {
        assert_eq!(parse_javac_major("javac 17.0.2\n"), Some(17));
        assert_eq!(parse_javac_major("javac 1.8.0_292"), Some(1));
        assert_eq!(parse_javac_major("javac 11"), Some(11));
        assert_eq!(parse_javac_major("javac 21-ea"), Some(21));
        assert_eq!(parse_javac_major("garbage"), None);
    }

    #[test]
    fn test_toolkit_floor_for_jdk() {
        assert_eq!(toolkit_floor_for_jdk(1), None);
        assert_eq!(toolkit_floor_for_jdk(8), None);
        assert_eq!(toolkit_floor_for_jdk(9), Some(v("303")));
        assert_eq!(toolkit_floor_for_jdk(11), Some(v("303")));
        assert_eq!(toolkit_floor_for_jdk(17), Some(v("310r20210706")));
    }

    #[test]
    fn test_effective_toolkit_takes_the_newer() {
        let required = v("222");
        let floor = v("303");
        assert_eq!(effective_toolkit(&required, Some(&floor)).as_str(), "303");
        assert_eq!(effective_toolkit(&required, None).as_str(), "222");
        let newer = v("310");
        assert_eq!(effective_toolkit(&newer, Some(&floor)).as_str(), "310");
    }

    #[test]
    fn test_layout_paths() {
        let layout = ToolkitLayout::new("/kits", "/aux");
        assert_eq!(layout.toolkit_path(&v("304")), PathBuf::from("/kits/jc304_kit"));
        assert_eq!(
            layout.gppro_jar("1.7"),
            PathBuf::from("/aux/gpapi/org.globalplatform-1.7/gpapi-globalplatform.jar")
        );
    }

    #[test]
    fn test_missing_auxiliary_jar_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ToolkitLayout::new(dir.path(), dir.path());
        let apis = AuxiliaryApis {
            visa: true,
            ..Default::default()
        };
        let err = layout.auxiliary_jars(&apis).unwrap_err();
        assert!(matches!(err, HarnessError::MissingJar(_)));

        std::fs::write(dir.path().join("visa.jar"), b"PK").unwrap();
        assert_eq!(layout.auxiliary_jars(&apis).unwrap().len(), 1);
        assert!(layout.auxiliary_jars(&AuxiliaryApis::default()).unwrap().is_empty());
    }
}
