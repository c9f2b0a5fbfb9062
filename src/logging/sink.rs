//! Append-only structured log sink.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::correlation::CorrelationContext;
use crate::logging::record::{LogLevel, LogRecord};

/// Errors raised while appending to the sink.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("log sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-service, append-only sink writing one JSON record per line.
pub struct StructuredLogger {
    service: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl StructuredLogger {
    /// Open (or create) the sink at `path` in append mode.
    pub fn open(service: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            service: service.into(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a record stamped with this sink's service name.
    pub fn record(
        &self,
        ctx: &CorrelationContext,
        route: &str,
        level: LogLevel,
        message: impl Into<String>,
    ) -> LogRecord {
        LogRecord::new(self.service.as_str(), ctx, route, level, message)
    }

    /// Append one record.
    ///
    /// The whole line is written with a single `write_all` while holding the lock,
    /// so concurrent writers never interleave within a record.
    pub fn append(&self, record: &LogRecord) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        {
            let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
            file.write_all(&line)?;
        }

        mirror(record);
        Ok(())
    }

    /// Append a record; a sink failure is reported on the diagnostic stream only.
    pub fn emit(&self, record: LogRecord) {
        if let Err(e) = self.append(&record) {
            tracing::error!(
                service = %self.service,
                path = %self.path.display(),
                trace_id = %record.trace_id,
                error = %e,
                "Failed to append log record"
            );
        }
    }
}

fn mirror(record: &LogRecord) {
    macro_rules! mirror_at {
        ($level:ident) => {
            tracing::$level!(
                service = %record.service_name,
                trace_id = %record.trace_id,
                user_id = %record.user_id,
                route = %record.route,
                duration_ms = ?record.duration_ms,
                "{}",
                record.full_message()
            )
        };
    }

    match record.level {
        LogLevel::Debug => mirror_at!(debug),
        LogLevel::Info => mirror_at!(info),
        LogLevel::Warn => mirror_at!(warn),
        LogLevel::Error => mirror_at!(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ctx() -> CorrelationContext {
        CorrelationContext::from_parts(Some("t-1"), None)
    }

    #[test]
    fn test_append_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/app.log");
        let logger = StructuredLogger::open("order", &path).unwrap();

        logger.append(&logger.record(&ctx(), "/create", LogLevel::Info, "one")).unwrap();
        logger.append(&logger.record(&ctx(), "/create", LogLevel::Info, "two")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LogRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.message, "one");
        assert_eq!(first.service_name, "order");
        assert_eq!(first.user_id, "unknown");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        StructuredLogger::open("a", &path).unwrap().emit(LogRecord::new("a", &ctx(), "/", LogLevel::Info, "first"));
        StructuredLogger::open("a", &path).unwrap().emit(LogRecord::new("a", &ctx(), "/", LogLevel::Info, "second"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let logger = Arc::new(StructuredLogger::open("payment", &path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let record = logger
                            .record(&ctx(), "/charge", LogLevel::Info, "x".repeat(512))
                            .with_field("writer", t)
                            .with_field("seq", i);
                        logger.append(&record).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let mut count = 0;
        for line in content.lines() {
            let record: LogRecord = serde_json::from_str(line).expect("torn record");
            assert_eq!(record.message.len(), 512);
            count += 1;
        }
        assert_eq!(count, 400);
    }
}
