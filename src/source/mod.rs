//! Log sources.
//!
//! # Data Flow
//! ```text
//! config [source] backend
//!     → file.rs  (bounded tail of a local structured log file)
//!     → index.rs (bulk query against a search index)
//!     → Arc<dyn LogSource>
//!     → pipeline pulls one bounded batch per run
//! ```
//!
//! # Design Decisions
//! - One capability, interchangeable backends selected by configuration
//! - A failed read aborts only that call; callers decide what to do next
//! - Readers never return a partially written record

pub mod file;
pub mod index;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{SourceBackend, SourceConfig};
use crate::logging::LogRecord;

pub use file::FileTail;
pub use index::{IndexQuery, QueryFilters};

/// Errors raised by a log source call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The local sink could not be opened or read.
    #[error("log source unavailable: {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The bulk query backend failed.
    #[error("log query failed: {0}")]
    Query(#[from] QueryError),
}

/// Errors raised by the index backend.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication rejected with status {0}")]
    Unauthorized(u16),

    #[error("index returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed index response: {0}")]
    Decode(String),
}

/// Capability to read recent log records.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    /// Read up to `limit` recent records.
    async fn fetch(&self, limit: usize) -> Result<Vec<LogRecord>, SourceError>;
}

/// Build the backend selected by the `[source]` config section.
pub fn from_config(
    config: &SourceConfig,
    client: reqwest::Client,
    timeout: Duration,
) -> Arc<dyn LogSource> {
    match config.backend {
        SourceBackend::File => Arc::new(FileTail::new(&config.file_path)),
        SourceBackend::Index => Arc::new(IndexQuery::from_config(config, client, timeout)),
    }
}
