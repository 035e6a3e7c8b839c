use crate::record::{LogLevel, LogRecord};
use crate::sink::{Sink, SinkError};
use std::io::Write;

/// Sink that prints the simple human-readable line to stdout.
///
/// Intended for interactive/dev runs; production configurations usually
/// disable it and rely on the file sinks.
pub struct ConsoleSink {
    min_level: LogLevel,
}

impl ConsoleSink {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", record.format_simple())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}
