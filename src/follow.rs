use crate::record::LogRecord;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Polling follower for an append-only log file.
///
/// Opens positioned at the end, so only lines written after `open` are ever
/// returned. Callers poll on their own schedule; each poll drains whatever
/// bytes have been appended and hands back complete lines one at a time. A
/// line still missing its newline stays buffered until the rest arrives, so
/// a writer caught mid-append never produces a torn line.
pub struct TailFollower {
    file: File,
    buf: Vec<u8>,
    pending: VecDeque<String>,
}

impl TailFollower {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            buf: Vec::new(),
            pending: VecDeque::new(),
        })
    }

    /// Next complete appended line, or `None` when nothing new has arrived.
    pub fn poll_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(line));
        }

        // A truncated file means the writer started over; follow it there.
        let pos = self.file.stream_position()?;
        if self.file.metadata()?.len() < pos {
            self.file.seek(SeekFrom::Start(0))?;
            self.buf.clear();
        }

        let mut chunk = [0u8; 8192];
        loop {
            let n = self.file.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }

        while let Some(idx) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=idx).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.pending
                .push_back(String::from_utf8_lossy(&line).into_owned());
        }
        Ok(self.pending.pop_front())
    }

    /// Next appended record, silently skipping lines that do not decode.
    pub fn poll_record(&mut self) -> io::Result<Option<LogRecord>> {
        while let Some(line) = self.poll_line()? {
            if let Ok(record) = serde_json::from_str(&line) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite;
    use crate::record::{LogLevel, LogRecord};
    use std::fs::OpenOptions;
    use std::io::Write;

    fn append(path: &Path, bytes: &[u8]) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn only_lines_after_open_are_seen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.jsonl");
        std::fs::write(&path, "old line 1\nold line 2\n").unwrap();

        let mut tail = TailFollower::open(&path).unwrap();
        assert!(tail.poll_line().unwrap().is_none());

        append(&path, b"fresh\n");
        assert_eq!(tail.poll_line().unwrap().as_deref(), Some("fresh"));
        assert!(tail.poll_line().unwrap().is_none());
    }

    #[test]
    fn partial_line_waits_for_its_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.jsonl");
        std::fs::write(&path, "").unwrap();

        let mut tail = TailFollower::open(&path).unwrap();
        append(&path, b"half a li");
        assert!(tail.poll_line().unwrap().is_none());

        append(&path, b"ne\nnext\n");
        assert_eq!(tail.poll_line().unwrap().as_deref(), Some("half a line"));
        assert_eq!(tail.poll_line().unwrap().as_deref(), Some("next"));
    }

    #[test]
    fn poll_record_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.jsonl");
        std::fs::write(&path, "").unwrap();

        let mut tail = TailFollower::open(&path).unwrap();
        let record = LogRecord::new(
            LogLevel::Warning,
            "BACKEND",
            "r9".to_string(),
            "test",
            callsite!(),
            "queue backlog".to_string(),
        );
        let mut payload = b"not json at all\n".to_vec();
        payload.extend_from_slice(serde_json::to_string(&record).unwrap().as_bytes());
        payload.push(b'\n');
        append(&path, &payload);

        let got = tail.poll_record().unwrap().unwrap();
        assert_eq!(got.msg, "queue backlog");
        assert_eq!(got.level, LogLevel::Warning);
        assert!(tail.poll_record().unwrap().is_none());
    }

    #[test]
    fn truncation_restarts_from_the_top() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.jsonl");
        std::fs::write(&path, "a long existing line that will vanish\n").unwrap();

        let mut tail = TailFollower::open(&path).unwrap();
        std::fs::write(&path, "new\n").unwrap();
        assert_eq!(tail.poll_line().unwrap().as_deref(), Some("new"));
    }
}
