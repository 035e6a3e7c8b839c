use crate::console::ConsoleSink;
use crate::context;
use crate::init::{
    InitError, LogConfig, APP_LOG_FILE, ERROR_LOG_FILE, ERROR_RETENTION_DAYS,
    GENERAL_RETENTION_DAYS, JSON_LOG_FILE,
};
use crate::jsonl::JsonlSink;
use crate::record::{CallSite, LogLevel, LogRecord};
use crate::rolling::RollingFileSink;
use crate::sink::{MultiSink, Sink};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Handle cache plus the sink fan-out all handles share.
///
/// Construct one per process (or per test) and pass it by reference;
/// [`crate::init`] offers a process-wide instance for call sites that
/// cannot thread one through.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: LogConfig,
    sinks: Arc<MultiSink>,
    handles: RwLock<HashMap<(String, String), Logger>>,
}

impl Registry {
    /// Build the sink layer for `config`, creating the log directory.
    ///
    /// **Effects**
    /// - creates `config.dir` if missing;
    /// - opens the general and error-only rotating text files (rotating a
    ///   stale active file from an earlier day) and the JSON-lines file;
    /// - attaches a console sink when `config.console` is set.
    ///
    /// Sink configuration is fixed for the registry's lifetime.
    pub fn new(config: LogConfig) -> Result<Self, InitError> {
        std::fs::create_dir_all(&config.dir).map_err(|source| InitError::CreateDir {
            dir: config.dir.display().to_string(),
            source,
        })?;

        let open_sink = |name: &'static str, base: &str, retention: usize, min: LogLevel| {
            RollingFileSink::open(name, &config.dir, base, retention, min).map_err(|source| {
                InitError::OpenSink { name, source }
            })
        };

        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        if config.console {
            sinks.push(Box::new(ConsoleSink::new(config.level)));
        }
        sinks.push(Box::new(open_sink(
            "app_file",
            APP_LOG_FILE,
            GENERAL_RETENTION_DAYS,
            LogLevel::Info,
        )?));
        sinks.push(Box::new(open_sink(
            "error_file",
            ERROR_LOG_FILE,
            ERROR_RETENTION_DAYS,
            LogLevel::Error,
        )?));
        sinks.push(Box::new(
            JsonlSink::open(&config.dir.join(JSON_LOG_FILE), LogLevel::Info).map_err(
                |source| InitError::OpenSink {
                    name: "jsonl",
                    source,
                },
            )?,
        ));

        Ok(Self {
            inner: Arc::new(RegistryInner {
                config,
                sinks: Arc::new(MultiSink::new(sinks)),
                handles: RwLock::new(HashMap::new()),
            }),
        })
    }

    /// Cached handle for `(module_tag, name)`, created on first use.
    ///
    /// Concurrent first lookups race to the write lock; construction
    /// happens once under it, so every caller observes the same handle.
    pub fn logger(&self, name: &str, module: &str) -> Logger {
        let key = (module.to_string(), name.to_string());
        if let Some(handle) = self.inner.handles.read().get(&key) {
            return handle.clone();
        }

        let mut handles = self.inner.handles.write();
        handles
            .entry(key)
            .or_insert_with(|| Logger {
                inner: Arc::new(LoggerInner {
                    name: name.to_string(),
                    module: module.to_string(),
                    level: self.inner.config.level,
                    sinks: Arc::clone(&self.inner.sinks),
                }),
            })
            .clone()
    }

    /// Handle tagged `FRONTEND`, for browser-originated events.
    pub fn frontend_logger(&self, name: &str) -> Logger {
        self.logger(name, "FRONTEND")
    }

    /// Handle tagged `SPAN`, the conventional choice for span tracing.
    pub fn span_logger(&self, name: &str) -> Logger {
        self.logger(name, "SPAN")
    }

    pub fn config(&self) -> &LogConfig {
        &self.inner.config
    }

    /// Path of the JSON-lines file the Query Engine reads.
    pub fn json_path(&self) -> PathBuf {
        self.inner.config.dir.join(JSON_LOG_FILE)
    }

    /// Path of the general rotating text file.
    pub fn text_path(&self) -> PathBuf {
        self.inner.config.dir.join(APP_LOG_FILE)
    }

    /// Path of the error-only rotating text file.
    pub fn error_path(&self) -> PathBuf {
        self.inner.config.dir.join(ERROR_LOG_FILE)
    }

    pub fn flush(&self) {
        self.inner.sinks.flush();
    }
}

/// Named, module-tagged emission handle. Cheap to clone; all clones share
/// the registry's sink fan-out.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    name: String,
    module: String,
    level: LogLevel,
    sinks: Arc<MultiSink>,
}

impl Logger {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn module(&self) -> &str {
        &self.inner.module
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.inner.level
    }

    /// Build a record for this handle, stamping the current correlation id.
    ///
    /// The id is read here, at emission time, so all sinks agree on it even
    /// when writes race.
    pub fn make_record(&self, level: LogLevel, msg: String, site: CallSite) -> LogRecord {
        LogRecord::new(
            level,
            &self.inner.module,
            context::current_request_id(),
            &self.inner.name,
            site,
            msg,
        )
    }

    /// Fan an already-built record out to the sinks. Records below the
    /// configured level are dropped here, before any sink sees them.
    pub fn dispatch(&self, record: LogRecord) {
        if record.level < self.inner.level {
            return;
        }
        self.inner.sinks.emit(&record);
    }

    /// Emission entry point used by the `log_*` macros.
    pub fn log(&self, level: LogLevel, msg: String, site: CallSite) {
        if !self.enabled(level) {
            return;
        }
        self.dispatch(self.make_record(level, msg, site));
    }

    #[cfg(test)]
    fn shares_sinks_with(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.inner.sinks, &other.inner.sinks)
    }
}

/// Emit a DEBUG record through `$logger`, capturing the call site.
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::record::LogLevel::Debug, format!($($arg)+), $crate::callsite!())
    };
}

/// Emit an INFO record through `$logger`, capturing the call site.
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::record::LogLevel::Info, format!($($arg)+), $crate::callsite!())
    };
}

/// Emit a WARNING record through `$logger`, capturing the call site.
#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::record::LogLevel::Warning, format!($($arg)+), $crate::callsite!())
    };
}

/// Emit an ERROR record through `$logger`, capturing the call site.
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::record::LogLevel::Error, format!($($arg)+), $crate::callsite!())
    };
}

/// Emit a CRITICAL record through `$logger`, capturing the call site.
#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::record::LogLevel::Critical, format!($($arg)+), $crate::callsite!())
    };
}
