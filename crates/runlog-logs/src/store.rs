//! Run log store: one append-only file per run

use runlog_core::{Error, Result, RunId};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::reader::LogReader;

/// Owns the logs directory and the one-line-per-append formatting policy
#[derive(Debug, Clone)]
pub struct RunLogStore {
    dir: PathBuf,
}

impl RunLogStore {
    /// Create a store rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a run's log file
    pub fn path_for(&self, run: &RunId) -> PathBuf {
        self.dir.join(run.as_str())
    }

    /// Append one line to a run's log, creating the log if absent
    pub async fn append(&self, run: &RunId, line: &str) -> Result<()> {
        let path = self.path_for(run);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let len = file.metadata().await?.len();
        let last_byte = if len > 0 {
            let mut byte = [0u8; 1];
            file.seek(SeekFrom::Start(len - 1)).await?;
            file.read_exact(&mut byte).await?;
            Some(byte[0])
        } else {
            None
        };

        let formatted = format_line(last_byte, line);
        if formatted.is_empty() {
            debug!("Blank append to empty {}, nothing written", path.display());
            return Ok(());
        }

        // One buffer, one write: readers never see half of the separator policy
        file.write_all(formatted.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended {} bytes to {}", formatted.len(), path.display());
        Ok(())
    }

    /// Delete a run's log. Succeeds when the log is already gone.
    pub async fn delete(&self, run: &RunId) -> Result<()> {
        let path = self.path_for(run);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether a run has a log
    pub async fn exists(&self, run: &RunId) -> bool {
        fs::metadata(self.path_for(run))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Open a run's log for reading from the start
    pub async fn open_for_read(&self, run: &RunId) -> Result<LogReader> {
        self.open_at(run, 0).await
    }

    /// Open a run's log for reading from `offset`
    pub async fn open_at(&self, run: &RunId, offset: u64) -> Result<LogReader> {
        LogReader::open_at(self.path_for(run), offset)
            .await
            .map_err(|e| not_found_as_run(e, run))
    }

    /// Whole current content of a run's log, without the final line terminator
    pub async fn read_full(&self, run: &RunId) -> Result<Vec<u8>> {
        let mut content = fs::read(self.path_for(run))
            .await
            .map_err(|e| not_found_as_run(e.into(), run))?;

        if content.last() == Some(&b'\n') {
            content.pop();
        }
        Ok(content)
    }
}

fn not_found_as_run(err: Error, run: &RunId) -> Error {
    if err.is_not_found() {
        Error::RunNotFound(run.to_string())
    } else {
        err
    }
}

/// Format a caller-supplied line for appending after a log ending in `last_byte`.
///
/// The line is trimmed and newline-terminated. A separator is added first only
/// when the log ends in an unterminated line, so every append stays on its own line.
/// A blank line on an empty log formats to nothing, so the log never starts with
/// an empty line.
pub fn format_line(last_byte: Option<u8>, line: &str) -> String {
    let line = line.trim();
    if line.is_empty() && last_byte.is_none() {
        return String::new();
    }
    let mut formatted = String::with_capacity(line.len() + 2);
    if matches!(last_byte, Some(b) if b != b'\n') {
        formatted.push('\n');
    }
    formatted.push_str(line);
    formatted.push('\n');
    formatted
}
