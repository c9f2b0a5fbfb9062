//! Local file backend.

use async_trait::async_trait;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::logging::LogRecord;
use crate::source::{LogSource, SourceError};

const BLOCK_SIZE: u64 = 8 * 1024;

/// Return the last `n` complete lines of `path`, oldest first.
///
/// Reads backwards in fixed blocks, so cost is bounded by the size of the tail
/// rather than the file. Bytes after the final newline belong to a write still in
/// flight and are never returned.
pub fn read_tail_lines(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut pos = file.metadata()?.len();
    let mut buf: Vec<u8> = Vec::new();
    let mut newlines = 0usize;

    while pos > 0 && newlines <= n {
        let read_len = BLOCK_SIZE.min(pos);
        pos -= read_len;
        file.seek(SeekFrom::Start(pos))?;

        let mut chunk = vec![0u8; read_len as usize];
        file.read_exact(&mut chunk)?;
        newlines += chunk.iter().filter(|b| **b == b'\n').count();

        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let Some(end) = buf.iter().rposition(|b| *b == b'\n') else {
        return Ok(Vec::new());
    };

    let text = String::from_utf8_lossy(&buf[..end]);
    let mut pieces: Vec<&str> = text.split('\n').collect();
    // Unless the whole file was read, the first piece may start mid-line.
    if pos > 0 && !pieces.is_empty() {
        pieces.remove(0);
    }

    let lines: Vec<String> = pieces
        .into_iter()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let skip = lines.len().saturating_sub(n);
    Ok(lines.into_iter().skip(skip).collect())
}

/// Bounded tail over a structured log file.
#[derive(Debug, Clone)]
pub struct FileTail {
    path: PathBuf,
}

impl FileTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last `n` raw lines, oldest first.
    pub async fn tail_lines(&self, n: usize) -> Result<Vec<String>, SourceError> {
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || read_tail_lines(&path, n))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)));

        result.map_err(|source| SourceError::Unavailable {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Last `n` records, oldest first. Lines that do not parse are skipped.
    pub async fn tail(&self, n: usize) -> Result<Vec<LogRecord>, SourceError> {
        let lines = self.tail_lines(n).await?;
        let records = lines
            .iter()
            .filter_map(|line| match serde_json::from_str::<LogRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Skipping unparseable log line");
                    None
                }
            })
            .collect();
        Ok(records)
    }
}

#[async_trait]
impl LogSource for FileTail {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<LogRecord>, SourceError> {
        self.tail(limit).await
    }
}
