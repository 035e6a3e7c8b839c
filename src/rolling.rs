use crate::record::{LogLevel, LogRecord};
use crate::sink::{Sink, SinkError};
use chrono::{DateTime, Local, NaiveDate};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Text-file sink with daily rotation and bounded retention.
///
/// The active file keeps a stable name (e.g. `application.log`). At the
/// first write past local midnight the file is renamed with a
/// `.%Y-%m-%d` suffix for the day that just ended, a fresh active file is
/// opened, and rotated files beyond the retention count are deleted,
/// oldest first. A leftover active file from an earlier day is rotated
/// on startup before any write.
pub struct RollingFileSink {
    name: &'static str,
    min_level: LogLevel,
    state: Mutex<RollingFile>,
}

impl RollingFileSink {
    pub fn open(
        name: &'static str,
        dir: &Path,
        base: &str,
        retention: usize,
        min_level: LogLevel,
    ) -> std::io::Result<Self> {
        Ok(Self {
            name,
            min_level,
            state: Mutex::new(RollingFile::open(dir, base, retention)?),
        })
    }

    /// Path of the active file.
    pub fn path(&self) -> PathBuf {
        self.state.lock().active_path()
    }
}

impl Sink for RollingFileSink {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.state.lock().write_line(&record.format_detailed())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.state.lock().file.flush()?;
        Ok(())
    }
}

struct RollingFile {
    dir: PathBuf,
    base: String,
    retention: usize,
    file: File,
    /// Local day the active file's content belongs to.
    open_date: NaiveDate,
}

impl RollingFile {
    fn open(dir: &Path, base: &str, retention: usize) -> std::io::Result<Self> {
        let path = dir.join(base);
        let today = Local::now().date_naive();

        // A file left behind by a previous run belongs to the day it was
        // last written; rotate it away before appending today's records.
        if let Some(stale) = stale_date(&path, today) {
            rotate_file(&path, base, stale)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let this = Self {
            dir: dir.to_path_buf(),
            base: base.to_string(),
            retention,
            file,
            open_date: today,
        };
        this.prune()?;
        Ok(this)
    }

    fn active_path(&self) -> PathBuf {
        self.dir.join(&self.base)
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.roll_if_needed()?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.file.write_all(buf.as_bytes())?;
        self.file.flush()
    }

    fn roll_if_needed(&mut self) -> std::io::Result<()> {
        let today = Local::now().date_naive();
        if today == self.open_date {
            return Ok(());
        }
        self.file.flush()?;
        let path = self.active_path();
        rotate_file(&path, &self.base, self.open_date)?;
        self.file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.open_date = today;
        self.prune()
    }

    /// Delete rotated files beyond the retention count, oldest first.
    fn prune(&self) -> std::io::Result<()> {
        let prefix = format!("{}.", self.base);
        let mut rotated: Vec<(NaiveDate, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.dir)?.flatten() {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(suffix) = name.strip_prefix(&prefix) {
                if let Ok(date) = NaiveDate::parse_from_str(suffix, "%Y-%m-%d") {
                    rotated.push((date, entry.path()));
                }
            }
        }

        if rotated.len() <= self.retention {
            return Ok(());
        }
        rotated.sort_by_key(|(date, _)| *date);
        for (_, path) in rotated.iter().take(rotated.len() - self.retention) {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Rename `path` to `base.%Y-%m-%d` for `date`, replacing any previous
/// rotation for the same day.
fn rotate_file(path: &Path, base: &str, date: NaiveDate) -> std::io::Result<()> {
    let rotated = path.with_file_name(format!("{}.{}", base, date.format("%Y-%m-%d")));
    if rotated.exists() {
        fs::remove_file(&rotated)?;
    }
    fs::rename(path, rotated)
}

/// The local day of the file's last write, if that day has already ended.
fn stale_date(path: &Path, today: NaiveDate) -> Option<NaiveDate> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let written: DateTime<Local> = modified.into();
    let day = written.date_naive();
    (day < today).then_some(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite;
    use chrono::Duration;

    fn record(level: LogLevel, msg: &str) -> LogRecord {
        LogRecord::new(
            level,
            "BACKEND",
            "----".to_string(),
            "test",
            callsite!(),
            msg.to_string(),
        )
    }

    #[test]
    fn writes_detailed_lines_to_active_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink =
            RollingFileSink::open("app_file", dir.path(), "application.log", 30, LogLevel::Info)
                .unwrap();

        sink.emit(&record(LogLevel::Info, "first")).unwrap();
        sink.emit(&record(LogLevel::Error, "second")).unwrap();

        let content = fs::read_to_string(dir.path().join("application.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("| INFO     |"));
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].contains("rolling.rs:"));
    }

    #[test]
    fn date_change_rotates_with_prior_day_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let sink =
            RollingFileSink::open("app_file", dir.path(), "application.log", 30, LogLevel::Info)
                .unwrap();
        sink.emit(&record(LogLevel::Info, "yesterday's entry")).unwrap();

        let yesterday = Local::now().date_naive() - Duration::days(1);
        sink.state.lock().open_date = yesterday;
        sink.emit(&record(LogLevel::Info, "today's entry")).unwrap();

        let rotated = dir
            .path()
            .join(format!("application.log.{}", yesterday.format("%Y-%m-%d")));
        assert!(rotated.exists());
        assert!(fs::read_to_string(&rotated).unwrap().contains("yesterday's entry"));

        let active = fs::read_to_string(dir.path().join("application.log")).unwrap();
        assert!(active.contains("today's entry"));
        assert!(!active.contains("yesterday's entry"));
    }

    #[test]
    fn prune_deletes_oldest_beyond_retention() {
        let dir = tempfile::tempdir().unwrap();
        for day in 1..=5 {
            fs::write(
                dir.path().join(format!("application.log.2024-01-0{day}")),
                "old",
            )
            .unwrap();
        }
        // Unrelated files must never be pruned.
        fs::write(dir.path().join("application.jsonl"), "{}").unwrap();

        let sink =
            RollingFileSink::open("app_file", dir.path(), "application.log", 3, LogLevel::Info)
                .unwrap();
        sink.emit(&record(LogLevel::Info, "x")).unwrap();

        let mut rotated: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("application.log."))
            .collect();
        rotated.sort();
        assert_eq!(
            rotated,
            vec![
                "application.log.2024-01-03",
                "application.log.2024-01-04",
                "application.log.2024-01-05"
            ]
        );
        assert!(dir.path().join("application.jsonl").exists());
    }

    #[test]
    fn reopening_same_day_appends() {
        let dir = tempfile::tempdir().unwrap();
        {
            let sink = RollingFileSink::open(
                "app_file",
                dir.path(),
                "application.log",
                30,
                LogLevel::Info,
            )
            .unwrap();
            sink.emit(&record(LogLevel::Info, "before restart")).unwrap();
        }
        let sink =
            RollingFileSink::open("app_file", dir.path(), "application.log", 30, LogLevel::Info)
                .unwrap();
        sink.emit(&record(LogLevel::Info, "after restart")).unwrap();

        let content = fs::read_to_string(dir.path().join("application.log")).unwrap();
        assert!(content.contains("before restart"));
        assert!(content.contains("after restart"));
    }
}
