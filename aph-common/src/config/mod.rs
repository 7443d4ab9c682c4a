//! Harness settings: where things live and how the profiler is launched.
//!
//! Values are layered with the precedence command line > environment
//! (`APH_*`) > `aph.toml` > built-in default, and each keeps its source.

pub mod env;
pub mod file;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use file::{DEFAULT_CONFIG_FILE, HarnessFile};
pub use source::{ConfigSource, Sourced};

use crate::errors::{HarnessError, Result};
use crate::run_config::DEFAULT_REPEAT_COUNT;
use crate::toolkit::ToolkitLayout;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MAX_REPEAT_COUNT: u32 = 1_000_000;

pub const DEFAULT_CATALOGUE: &str = "test-data.json";
pub const DEFAULT_TOOLKITS_DIR: &str = "jckit";
pub const DEFAULT_PROFILER_JAR: &str = "../build/libs/JCProfilerNext-1.0-SNAPSHOT.jar";
pub const DEFAULT_STATS_DIR: &str = "stats_out";

/// Values given on the command line; `None` means not given.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub catalogue: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub repeat_count: Option<u32>,
    pub profiler_jar: Option<PathBuf>,
    pub java: Option<PathBuf>,
    pub stats_dir: Option<PathBuf>,
    pub manifests_dir: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessSettings {
    pub catalogue: Sourced<PathBuf>,
    /// Where applet sources are cloned or unpacked.
    pub fixtures_dir: Sourced<PathBuf>,
    pub toolkits_dir: Sourced<PathBuf>,
    pub auxiliary_dir: Sourced<PathBuf>,
    /// Directory with `{constants,types,methods}-in.txt`.
    pub manifests_dir: Sourced<PathBuf>,
    pub java: Sourced<PathBuf>,
    pub javac: Sourced<PathBuf>,
    pub profiler_jar: Sourced<PathBuf>,
    pub repeat_count: Sourced<u32>,
    pub output_dir: Sourced<PathBuf>,
    pub stats_dir: Sourced<PathBuf>,
}

fn layer<T>(
    default: T,
    file: Option<Sourced<T>>,
    env: Option<Sourced<T>>,
    cli: Option<T>,
) -> Sourced<T> {
    Sourced::default_value(default)
        .override_with(file)
        .override_with(env)
        .override_with(cli.map(Sourced::from_cli))
}

impl HarnessSettings {
    /// Layer command line, environment, file and defaults.
    ///
    /// All environment problems are reported together as one error.
    pub fn resolve(
        file: Option<(PathBuf, HarnessFile)>,
        overrides: SettingsOverrides,
        env: &mut EnvParser,
    ) -> Result<Self> {
        let (file_path, file) = match file {
            Some((path, file)) => (Some(path), file),
            None => (None, HarnessFile::default()),
        };
        let from_file = |value: Option<PathBuf>| -> Option<Sourced<PathBuf>> {
            let path = file_path.as_deref()?;
            value.map(|value| Sourced::from_file(value, path))
        };

        if let (Some(count), Some(path)) = (file.repeat_count, file_path.as_deref())
            && !(1..=MAX_REPEAT_COUNT).contains(&count)
        {
            return Err(HarnessError::ConfigFile {
                path: path.to_path_buf(),
                message: format!("repeat_count {count} outside 1..={MAX_REPEAT_COUNT}"),
            });
        }

        let settings = Self {
            catalogue: layer(
                PathBuf::from(DEFAULT_CATALOGUE),
                from_file(file.catalogue),
                env.path("CATALOGUE"),
                overrides.catalogue,
            ),
            fixtures_dir: layer(
                PathBuf::from("."),
                from_file(file.fixtures_dir),
                env.path("FIXTURES_DIR"),
                None,
            ),
            toolkits_dir: layer(
                PathBuf::from(DEFAULT_TOOLKITS_DIR),
                from_file(file.toolkits_dir),
                env.path("TOOLKITS_DIR"),
                None,
            ),
            auxiliary_dir: layer(PathBuf::from("."), from_file(file.auxiliary_dir), None, None),
            manifests_dir: layer(
                PathBuf::from("."),
                from_file(file.manifests_dir),
                None,
                overrides.manifests_dir,
            ),
            java: layer(
                PathBuf::from("java"),
                from_file(file.java),
                env.path("JAVA"),
                overrides.java,
            ),
            javac: layer(PathBuf::from("javac"), from_file(file.javac), None, None),
            profiler_jar: layer(
                PathBuf::from(DEFAULT_PROFILER_JAR),
                from_file(file.profiler_jar),
                env.path("PROFILER_JAR"),
                overrides.profiler_jar,
            ),
            repeat_count: layer(
                DEFAULT_REPEAT_COUNT,
                file.repeat_count
                    .zip(file_path.as_deref())
                    .map(|(count, path)| Sourced::from_file(count, path)),
                env.u32_in("REPEAT_COUNT", 1..=MAX_REPEAT_COUNT),
                overrides.repeat_count,
            ),
            output_dir: layer(
                PathBuf::from("."),
                from_file(file.output_dir),
                env.path("OUTPUT_DIR"),
                overrides.output_dir,
            ),
            stats_dir: layer(
                PathBuf::from(DEFAULT_STATS_DIR),
                from_file(file.stats_dir),
                None,
                overrides.stats_dir,
            ),
        };

        if let Err(problems) = env.finish() {
            let messages: Vec<String> = problems.iter().map(ToString::to_string).collect();
            return Err(HarnessError::Env(messages.join("; ")));
        }

        settings.log_sources();
        Ok(settings)
    }

    pub fn toolkit_layout(&self) -> ToolkitLayout {
        ToolkitLayout::new(&self.toolkits_dir.value, &self.auxiliary_dir.value)
    }

    /// Directory relative `inputFile` paths resolve against: the catalogue's.
    pub fn data_root(&self) -> PathBuf {
        self.catalogue
            .value
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn log_sources(&self) {
        let entries: [(&str, &Sourced<PathBuf>); 10] = [
            ("catalogue", &self.catalogue),
            ("fixtures_dir", &self.fixtures_dir),
            ("toolkits_dir", &self.toolkits_dir),
            ("auxiliary_dir", &self.auxiliary_dir),
            ("manifests_dir", &self.manifests_dir),
            ("java", &self.java),
            ("javac", &self.javac),
            ("profiler_jar", &self.profiler_jar),
            ("output_dir", &self.output_dir),
            ("stats_dir", &self.stats_dir),
        ];
        for (key, value) in entries {
            debug!(key, value = %value.value.display(), source = %value.source, "Setting");
        }
        debug!(
            key = "repeat_count",
            value = self.repeat_count.value,
            source = %self.repeat_count.source,
            "Setting"
        );
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    const VARS: [&str; 7] = [
        "APH_CATALOGUE",
        "APH_FIXTURES_DIR",
        "APH_TOOLKITS_DIR",
        "APH_JAVA",
        "APH_PROFILER_JAR",
        "APH_REPEAT_COUNT",
        "APH_OUTPUT_DIR",
    ];

    fn clear() {
        for var in VARS {
            // SAFETY: env_test_lock serialises every test that touches the environment
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env_test_lock serialises every test that touches the environment
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    fn test_defaults() {
        let _guard = env_test_lock();
        clear();
        let settings =
            HarnessSettings::resolve(None, SettingsOverrides::default(), &mut EnvParser::new())
                .unwrap();
        assert_eq!(settings.repeat_count.value, DEFAULT_REPEAT_COUNT);
        assert!(settings.repeat_count.is_default());
        assert_eq!(settings.java.value, PathBuf::from("java"));
        assert_eq!(settings.data_root(), PathBuf::new());
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let _guard = env_test_lock();
        clear();
        let file = HarnessFile {
            repeat_count: Some(5),
            output_dir: Some(PathBuf::from("file-out")),
            java: Some(PathBuf::from("/file/java")),
            ..Default::default()
        };
        set_env("APH_REPEAT_COUNT", "7");
        set_env("APH_OUTPUT_DIR", "env-out");
        let overrides = SettingsOverrides {
            output_dir: Some(PathBuf::from("cli-out")),
            ..Default::default()
        };

        let settings = HarnessSettings::resolve(
            Some((PathBuf::from("aph.toml"), file)),
            overrides,
            &mut EnvParser::new(),
        )
        .unwrap();
        clear();

        assert_eq!(settings.output_dir.value, PathBuf::from("cli-out"));
        assert_eq!(settings.output_dir.source, ConfigSource::Cli);
        assert_eq!(settings.repeat_count.value, 7);
        assert_eq!(settings.repeat_count.source, ConfigSource::Environment);
        assert_eq!(settings.java.value, PathBuf::from("/file/java"));
        assert_eq!(settings.java.origin.as_deref(), Some("aph.toml"));
    }

    #[test]
    fn test_env_errors_are_collected() {
        let _guard = env_test_lock();
        clear();
        set_env("APH_REPEAT_COUNT", "0");
        let err =
            HarnessSettings::resolve(None, SettingsOverrides::default(), &mut EnvParser::new())
                .unwrap_err();
        clear();
        assert!(matches!(err, HarnessError::Env(_)));
        assert!(err.to_string().contains("APH_REPEAT_COUNT"));
    }

    #[test]
    fn test_file_repeat_count_is_range_checked() {
        let _guard = env_test_lock();
        clear();
        let file = HarnessFile {
            repeat_count: Some(0),
            ..Default::default()
        };
        let err = HarnessSettings::resolve(
            Some((PathBuf::from("aph.toml"), file)),
            SettingsOverrides::default(),
            &mut EnvParser::new(),
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::ConfigFile { .. }));
    }

    #[test]
    fn test_data_root_is_catalogue_directory() {
        let _guard = env_test_lock();
        clear();
        let overrides = SettingsOverrides {
            catalogue: Some(PathBuf::from("suite/test-data.json")),
            ..Default::default()
        };
        let settings =
            HarnessSettings::resolve(None, overrides, &mut EnvParser::new()).unwrap();
        assert_eq!(settings.data_root(), PathBuf::from("suite"));
        assert_eq!(settings.toolkit_layout().toolkits_dir, PathBuf::from("jckit"));
    }
}
