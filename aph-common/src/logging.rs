//! Logging initialisation shared by the harness binaries.

use crate::config::EnvParser;
use crate::errors::{HarnessError, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default level when neither `APH_LOG` nor `RUST_LOG` carries directives.
    pub level: String,
    pub format: LogFormat,
    pub stderr: bool,
    /// Directory for daily-rotated JSON log files.
    pub file_dir: Option<PathBuf>,
}

impl LogConfig {
    /// Read `APH_LOG`, `APH_LOG_FORMAT` and `APH_LOG_DIR`.
    pub fn from_env(default_level: &str) -> Self {
        let mut env = EnvParser::new();
        let level = env.log_level("LOG", default_level).value;
        let format = match env.string("LOG_FORMAT") {
            Some(format) if format.value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let file_dir = env.path("LOG_DIR").map(|dir| dir.value);
        Self {
            level,
            format,
            stderr: false,
            file_dir,
        }
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.file_dir = dir;
        self
    }

    fn filter(&self) -> EnvFilter {
        std::env::var("RUST_LOG")
            .ok()
            .filter(|directives| !directives.is_empty())
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(&self.level))
    }
}

/// Keeps background log writers alive; drop it last.
#[derive(Default)]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = LoggingGuards::default();

    if config.stderr {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        layers.push(match config.format {
            LogFormat::Pretty => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if let Some(dir) = &config.file_dir {
        std::fs::create_dir_all(dir)?;
        let appender = tracing_appender::rolling::daily(dir, "aph.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        );
        guards._file = Some(guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(config.filter())
        .try_init()
        .map_err(|err| HarnessError::Env(format!("logging: {err}")))?;
    Ok(guards)
}
