//! Cursor-based log reader for tail and follow operations

use runlog_core::Result;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const READ_CHUNK: usize = 64 * 1024;

/// What a re-stat found relative to the reader's position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Nothing beyond what was already read
    Unchanged,
    /// New bytes past the read position
    Grew,
    /// Same file, now shorter than what was read
    Truncated,
    /// The path names a different file than the open handle
    Replaced,
    /// The path no longer exists
    Missing,
}

/// Device and inode of a file, where the platform exposes them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// Reads complete lines from a log, tracking a byte cursor.
///
/// The cursor always sits on a line boundary. Bytes of an unterminated trailing
/// line are held back and only returned once their newline arrives.
pub struct LogReader {
    path: PathBuf,
    file: File,
    identity: Option<FileIdentity>,
    /// Offset just past the last line handed out
    cursor: u64,
    /// Bytes read from `cursor` onwards that do not yet form a complete line
    pending: Vec<u8>,
    /// How far `pending` has been searched for a newline
    scanned: usize,
    /// Read buffer reused across refills
    chunk: Box<[u8]>,
}

impl LogReader {
    /// Open a log positioned at `offset`
    pub async fn open_at(path: PathBuf, offset: u64) -> Result<Self> {
        let mut file = File::open(&path).await?;
        let identity = FileIdentity::of(&file.metadata().await?);
        file.seek(SeekFrom::Start(offset)).await?;

        Ok(Self {
            path,
            file,
            identity,
            cursor: offset,
            pending: Vec::new(),
            scanned: 0,
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
        })
    }

    /// Open a log positioned at the start
    pub async fn open(path: PathBuf) -> Result<Self> {
        Self::open_at(path, 0).await
    }

    /// Offset of the last confirmed line boundary
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Offset up to which the file has been read, including a held-back partial line
    pub fn read_position(&self) -> u64 {
        self.cursor + self.pending.len() as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the open file
    pub async fn size(&self) -> Result<u64> {
        Ok(self.file.metadata().await?.len())
    }

    /// Next complete line without its terminator, or `None` when only a
    /// partial line (or nothing) remains before end of file
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(i) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
                let end = self.scanned + i;
                let mut line: Vec<u8> = self.pending.drain(..=end).collect();
                self.cursor += line.len() as u64;
                self.scanned = 0;

                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            self.scanned = self.pending.len();

            let n = self.file.read(&mut self.chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.pending.extend_from_slice(&self.chunk[..n]);
        }
    }

    /// Compare the file on disk with what has been read so far
    pub async fn check(&self) -> Result<FileState> {
        let on_disk = match fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileState::Missing),
            Err(e) => return Err(e.into()),
        };

        if let (Some(open), Some(disk)) = (self.identity, FileIdentity::of(&on_disk)) {
            if open != disk {
                return Ok(FileState::Replaced);
            }
        }

        let size = self.size().await?;
        let read_to = self.read_position();
        Ok(if size < read_to {
            FileState::Truncated
        } else if size > read_to {
            FileState::Grew
        } else {
            FileState::Unchanged
        })
    }

    /// Move back to the start of the same file, dropping any held-back bytes
    pub async fn rewind(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0)).await?;
        self.reset_position(0);
        Ok(())
    }

    /// Open whatever file the path names now and start from its beginning
    pub async fn reopen(&mut self) -> Result<()> {
        let file = File::open(&self.path).await?;
        self.identity = FileIdentity::of(&file.metadata().await?);
        self.file = file;
        self.reset_position(0);
        Ok(())
    }

    fn reset_position(&mut self, offset: u64) {
        self.cursor = offset;
        self.pending.clear();
        self.scanned = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    async fn drain(reader: &mut LogReader) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_reads_complete_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        append(&path, "one\ntwo\r\nthree\n");

        let mut reader = LogReader::open(path).await.unwrap();
        assert_eq!(drain(&mut reader).await, vec!["one", "two", "three"]);
        assert_eq!(reader.cursor(), 15);
        assert_eq!(reader.check().await.unwrap(), FileState::Unchanged);
    }

    #[tokio::test]
    async fn test_partial_line_held_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        append(&path, "done\nhalf");

        let mut reader = LogReader::open(path.clone()).await.unwrap();
        assert_eq!(drain(&mut reader).await, vec!["done"]);
        assert_eq!(reader.cursor(), 5);
        assert_eq!(reader.read_position(), 9);

        append(&path, " and whole\nnext");
        assert_eq!(reader.check().await.unwrap(), FileState::Grew);
        assert_eq!(drain(&mut reader).await, vec!["half and whole"]);
        assert_eq!(reader.cursor(), 20);
    }

    #[tokio::test]
    async fn test_empty_lines_are_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        append(&path, "\n\nx\n");

        let mut reader = LogReader::open(path).await.unwrap();
        assert_eq!(drain(&mut reader).await, vec!["", "", "x"]);
    }

    #[tokio::test]
    async fn test_long_lines_span_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        let long = "y".repeat(READ_CHUNK * 2 + 17);
        append(&path, &format!("{}\nshort\n", long));

        let mut reader = LogReader::open(path).await.unwrap();
        let lines = drain(&mut reader).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), long.len());
        assert_eq!(lines[1], "short");
    }

    #[tokio::test]
    async fn test_refills_do_not_leak_stale_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        append(&path, &format!("{}\n", "z".repeat(READ_CHUNK - 3)));

        let mut reader = LogReader::open(path.clone()).await.unwrap();
        assert_eq!(drain(&mut reader).await.len(), 1);

        // Each wake-up refills into the same buffer after a full-chunk read
        for i in 0..3 {
            append(&path, &format!("tick {}\n", i));
            assert_eq!(drain(&mut reader).await, vec![format!("tick {}", i)]);
        }
        assert_eq!(drain(&mut reader).await, Vec::<String>::new());
        assert_eq!(reader.check().await.unwrap(), FileState::Unchanged);
    }

    #[tokio::test]
    async fn test_detects_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        append(&path, "aaaa\nbbbb\n");

        let mut reader = LogReader::open(path.clone()).await.unwrap();
        drain(&mut reader).await;

        OpenOptions::new().write(true).truncate(true).open(&path).unwrap();
        append(&path, "c\n");
        assert_eq!(reader.check().await.unwrap(), FileState::Truncated);

        reader.rewind().await.unwrap();
        assert_eq!(reader.cursor(), 0);
        assert_eq!(drain(&mut reader).await, vec!["c"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detects_replacement() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        append(&path, "old\n");

        let mut reader = LogReader::open(path.clone()).await.unwrap();
        drain(&mut reader).await;

        let staged = dir.path().join("run.new");
        append(&staged, "new one\nnew two\n");
        std::fs::rename(&staged, &path).unwrap();

        assert_eq!(reader.check().await.unwrap(), FileState::Replaced);
        reader.reopen().await.unwrap();
        assert_eq!(drain(&mut reader).await, vec!["new one", "new two"]);
    }

    #[tokio::test]
    async fn test_missing_after_delete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run");
        append(&path, "x\n");

        let reader = LogReader::open(path.clone()).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(reader.check().await.unwrap(), FileState::Missing);
    }
}
