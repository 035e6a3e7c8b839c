use crate::env::{env_or, SPANLOG_CONSOLE_ENV, SPANLOG_DIR_ENV, SPANLOG_LEVEL_ENV};
use crate::log_info;
use crate::record::LogLevel;
use crate::registry::{Logger, Registry};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use thiserror::Error;

/// Active text file name; rotated copies get a `.%Y-%m-%d` suffix.
pub const APP_LOG_FILE: &str = "application.log";
/// Error-only text file name.
pub const ERROR_LOG_FILE: &str = "application_errors.log";
/// JSON-lines file name, the Query Engine's input.
pub const JSON_LOG_FILE: &str = "application.jsonl";

/// Rotated files kept for the general text sink.
pub const GENERAL_RETENTION_DAYS: usize = 30;
/// Rotated files kept for the error-only text sink; errors are kept longer.
pub const ERROR_RETENTION_DAYS: usize = 90;

/// Sink-layer configuration, fixed for the lifetime of a registry.
///
/// **Fields**
/// - `dir`: directory receiving all three log files.
/// - `level`: least severe level emitted at all; the console sink also
///   uses it, the file sinks keep their own INFO/ERROR floors.
/// - `console`: attach the stdout sink (interactive/dev runs).
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub level: LogLevel,
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: LogLevel::Info,
            console: true,
        }
    }
}

impl LogConfig {
    /// Configuration from `SPANLOG_DIR`, `SPANLOG_LEVEL` and
    /// `SPANLOG_CONSOLE`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let level = std::env::var(SPANLOG_LEVEL_ENV)
            .ok()
            .and_then(|v| LogLevel::parse(&v))
            .unwrap_or(defaults.level);
        let console = !matches!(
            env_or(SPANLOG_CONSOLE_ENV, "1").to_ascii_lowercase().as_str(),
            "0" | "false" | "no"
        );
        Self {
            dir: PathBuf::from(env_or(SPANLOG_DIR_ENV, "logs")),
            level,
            console,
        }
    }
}

/// Failure building the sink layer.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create log directory {dir}: {source}")]
    CreateDir {
        dir: String,
        source: std::io::Error,
    },
    #[error("failed to open {name} sink: {source}")]
    OpenSink {
        name: &'static str,
        source: std::io::Error,
    },
}

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// Initialize the process-wide registry.
///
/// **Behavior**
///
/// The first call builds the sink layer from `config` and emits one INFO
/// record announcing the configuration. Every later call returns the
/// already-built registry unchanged, whatever `config` it received: sink
/// configuration is set once per process. Call sites that can carry an
/// explicit [`Registry`] should prefer [`Registry::new`].
pub fn init(config: LogConfig) -> Result<&'static Registry, InitError> {
    let mut first = false;
    let registry = GLOBAL.get_or_try_init(|| {
        first = true;
        Registry::new(config)
    })?;
    if first {
        let logger = registry.logger("spanlog", "MAIN");
        log_info!(
            logger,
            "Logging initialized | level={} | dir={}",
            registry.config().level,
            registry.config().dir.display()
        );
    }
    Ok(registry)
}

/// The process-wide registry, if [`init`] (or [`logger`]) ran.
pub fn try_global() -> Option<&'static Registry> {
    GLOBAL.get()
}

/// Handle from the process-wide registry, initializing it lazily from the
/// environment on first use.
pub fn logger(name: &str, module: &str) -> Result<Logger, InitError> {
    Ok(init(LogConfig::from_env())?.logger(name, module))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.dir, PathBuf::from("logs"));
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.console);
    }

    #[test]
    fn config_from_env_reads_all_three_vars() {
        std::env::set_var(SPANLOG_DIR_ENV, "/tmp/spanlog-test");
        std::env::set_var(SPANLOG_LEVEL_ENV, "warning");
        std::env::set_var(SPANLOG_CONSOLE_ENV, "0");

        let config = LogConfig::from_env();
        assert_eq!(config.dir, PathBuf::from("/tmp/spanlog-test"));
        assert_eq!(config.level, LogLevel::Warning);
        assert!(!config.console);

        std::env::remove_var(SPANLOG_DIR_ENV);
        std::env::remove_var(SPANLOG_LEVEL_ENV);
        std::env::remove_var(SPANLOG_CONSOLE_ENV);
    }
}
