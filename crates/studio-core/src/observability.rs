//! Process-wide tracing setup.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "studio.logs.jsonl";

/// Where log lines go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stderr, leaving stdout to the REPL.
    Console,
    /// JSON lines appended to a file.
    JsonFile(PathBuf),
}

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    /// Filter directive; `None` falls back to `RUST_LOG`, then `warn`.
    pub level: Option<String>,
    pub sink: LogSink,
}

impl ObservabilityConfig {
    /// Reads `STUDIO_OBSERVABILITY_ENABLED`, `STUDIO_LOG_LEVEL` and
    /// `STUDIO_JSON_LOG_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("STUDIO_OBSERVABILITY_ENABLED")
            .map(|v| parse_flag(&v).unwrap_or(true))
            .unwrap_or(true);
        let level = lookup("STUDIO_LOG_LEVEL").filter(|v| !v.trim().is_empty());
        let sink = match lookup("STUDIO_JSON_LOG_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => LogSink::JsonFile(PathBuf::from(path)),
            None => LogSink::Console,
        };
        Self {
            enabled,
            level,
            sink,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(level) = &self.level
            && let Ok(filter) = EnvFilter::try_new(level)
        {
            return filter;
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Installs the global subscriber once per process using [`ObservabilityConfig::from_env`].
pub fn init_observability() {
    init_with(ObservabilityConfig::from_env());
}

/// Installs the global subscriber once per process. Later calls are no-ops.
pub fn init_with(config: ObservabilityConfig) {
    INIT.get_or_init(|| {
        if !config.enabled {
            return;
        }
        let filter = config.env_filter();
        match &config.sink {
            LogSink::JsonFile(path) => {
                let (dir, file_name) = split_log_path(path);
                let _ = std::fs::create_dir_all(&dir);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file_name));
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
            LogSink::Console => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
        }
    });
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}
