use crate::record::{LogLevel, LogRecord};
use thiserror::Error;

/// Failure emitting one record to one sink.
///
/// Serialization and I/O are deliberately separate variants: a record that
/// cannot be encoded is dropped for that sink only, while an I/O failure
/// says nothing about the record itself.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Synchronous destination for [`LogRecord`]s.
///
/// Implementations persist or display a record for a concrete target
/// (stdout, rotating text file, JSON-lines file). Writes are bounded local
/// I/O, called inline from the emitting task under the sink's own lock.
pub trait Sink: Send + Sync {
    /// Short name used when a failure is reported on the fallback channel.
    fn name(&self) -> &'static str;

    /// Least severe level this sink accepts. Records below it are not
    /// offered to the sink at all.
    fn min_level(&self) -> LogLevel;

    /// Persist a single record.
    ///
    /// **Parameters**
    /// - `record`: fully-populated [`LogRecord`], correlation id already
    ///   attached.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was written.
    /// - `Err(..)` if this sink failed. The failure is contained by the
    ///   fan-out; other sinks still receive the record and the emitting
    ///   call site is never affected.
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Flush buffered output, if any. Default is a no-op.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Fan-out over all configured sinks.
///
/// Every qualifying sink receives every record independently; one sink's
/// failure is reported on stderr and never stops the others.
pub struct MultiSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn emit(&self, record: &LogRecord) {
        for sink in &self.sinks {
            if record.level < sink.min_level() {
                continue;
            }
            if let Err(e) = sink.emit(record) {
                eprintln!("spanlog: {} sink error: {}", sink.name(), e);
            }
        }
    }

    pub fn flush(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                eprintln!("spanlog: {} sink flush error: {}", sink.name(), e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
