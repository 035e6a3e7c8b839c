use crate::record::{LogLevel, LogRecord};
use crate::sink::{Sink, SinkError};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only JSON-lines sink: one sparse JSON object per line, UTF-8,
/// flushed per record. This file is the Query Engine's only input.
///
/// A record that fails to serialize is dropped for this sink alone; the
/// fan-out reports the failure on stderr and the emitting call site never
/// sees it.
pub struct JsonlSink {
    min_level: LogLevel,
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    pub fn open(path: &Path, min_level: LogLevel) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            min_level,
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for JsonlSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        // One write_all per record keeps lines whole under interleaving.
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.file.lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite;
    use crate::record::ContextMap;

    fn record(msg: &str) -> LogRecord {
        LogRecord::new(
            LogLevel::Info,
            "BACKEND",
            "req-9".to_string(),
            "test",
            callsite!(),
            msg.to_string(),
        )
    }

    #[test]
    fn every_line_parses_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.jsonl");
        let sink = JsonlSink::open(&path, LogLevel::Info).unwrap();

        sink.emit(&record("plain")).unwrap();
        let mut ctx = ContextMap::new();
        ctx.insert("order_id".into(), serde_json::json!(1234));
        ctx.insert("note".into(), serde_json::json!("multi\nline"));
        sink.emit(&record("with context").with_context(ctx)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let parsed: LogRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.request_id, "req-9");
        }
    }

    #[test]
    fn append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.jsonl");
        {
            let sink = JsonlSink::open(&path, LogLevel::Info).unwrap();
            sink.emit(&record("one")).unwrap();
        }
        let sink = JsonlSink::open(&path, LogLevel::Info).unwrap();
        sink.emit(&record("two")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn below_min_level_is_callers_responsibility() {
        // The sink itself does not re-check level; the fan-out gates on
        // min_level before calling emit.
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::open(&dir.path().join("a.jsonl"), LogLevel::Info).unwrap();
        assert_eq!(sink.min_level(), LogLevel::Info);
    }
}
