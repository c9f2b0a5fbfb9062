//! Structured logging subsystem.
//!
//! # Data Flow
//! ```text
//! middleware / handlers
//!     → record.rs (LogRecord built from a CorrelationContext)
//!     → sink.rs (serialize to one JSON line, single locked write)
//!     → per-service append-only file
//!     → mirrored to `tracing` for the diagnostic stream
//! ```
//!
//! # Design Decisions
//! - One record per line; a line is the unit of atomicity
//! - Records are immutable once appended
//! - Readers live in `crate::source` and never see a partial line

pub mod record;
pub mod sink;

pub use record::{LogLevel, LogRecord};
pub use sink::{LogError, StructuredLogger};
