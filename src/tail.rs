use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// Reads a file's lines newest-first in fixed-size chunks from the end,
/// so tail-bounded queries never load the whole file.
pub struct RevLineReader {
    file: File,
    /// File offset of the first byte not yet pulled into `buf`.
    pos: u64,
    buf: Vec<u8>,
    chunk_size: usize,
    first_fill: bool,
}

impl RevLineReader {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Self::with_chunk_size(path, CHUNK_SIZE)
    }

    fn with_chunk_size(path: &Path, chunk_size: usize) -> std::io::Result<Self> {
        let mut file = File::open(path)?;
        let pos = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            pos,
            buf: Vec::new(),
            chunk_size: chunk_size.max(1),
            first_fill: true,
        })
    }

    /// Next line toward the start of the file, without its newline.
    /// Returns `None` once the start has been passed.
    pub fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(idx) = self.buf.iter().rposition(|&b| b == b'\n') {
                let line = self.buf.split_off(idx + 1);
                self.buf.pop();
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.pos == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.buf);
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let read_size = self.chunk_size.min(self.pos as usize);
            self.pos -= read_size as u64;
            self.file.seek(SeekFrom::Start(self.pos))?;
            let mut chunk = vec![0u8; read_size];
            self.file.read_exact(&mut chunk)?;

            // The file's final newline terminates the last line rather
            // than opening an empty one.
            if self.first_fill {
                self.first_fill = false;
                if self.buf.is_empty() && chunk.last() == Some(&b'\n') {
                    chunk.pop();
                }
            }

            chunk.extend_from_slice(&self.buf);
            self.buf = chunk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(lines: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut f = File::create(&path).unwrap();
        f.write_all(lines.as_bytes()).unwrap();
        (dir, path)
    }

    fn drain(reader: &mut RevLineReader) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = reader.next_line().unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn yields_lines_newest_first() {
        let (_dir, path) = write_file("one\ntwo\nthree\n");
        let mut reader = RevLineReader::open(&path).unwrap();
        assert_eq!(drain(&mut reader), vec!["three", "two", "one"]);
    }

    #[test]
    fn empty_file_yields_nothing() {
        let (_dir, path) = write_file("");
        let mut reader = RevLineReader::open(&path).unwrap();
        assert_eq!(drain(&mut reader), Vec::<String>::new());
    }

    #[test]
    fn unterminated_final_line_is_still_a_line() {
        let (_dir, path) = write_file("one\ntwo\npartial");
        let mut reader = RevLineReader::open(&path).unwrap();
        assert_eq!(drain(&mut reader), vec!["partial", "two", "one"]);
    }

    #[test]
    fn lines_spanning_chunk_boundaries_are_reassembled() {
        let (_dir, path) = write_file("abcdefghij\nklmnopqrst\nuvwxyz\n");
        let mut reader = RevLineReader::with_chunk_size(&path, 4).unwrap();
        assert_eq!(drain(&mut reader), vec!["uvwxyz", "klmnopqrst", "abcdefghij"]);
    }

    #[test]
    fn blank_lines_are_preserved() {
        let (_dir, path) = write_file("one\n\ntwo\n");
        let mut reader = RevLineReader::open(&path).unwrap();
        assert_eq!(drain(&mut reader), vec!["two", "", "one"]);
    }

    #[test]
    fn single_line_no_newline() {
        let (_dir, path) = write_file("{\"only\":1}");
        let mut reader = RevLineReader::with_chunk_size(&path, 3).unwrap();
        assert_eq!(drain(&mut reader), vec!["{\"only\":1}"]);
    }
}
