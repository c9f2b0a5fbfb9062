//! Log-analysis-to-incident pipeline.
//!
//! # Data Flow
//! ```text
//! LogSource::fetch(batch_size)
//!     → runner.rs, per record (bounded concurrency):
//!         Unclassified → Ignored
//!                      → Classified → Ticketed | TicketFailed
//!     → RunReport
//!
//! scheduler.rs: run_once every interval until shutdown; hot-swaps the
//! classifier table on config reload
//! ```
//!
//! # Design Decisions
//! - No read offset is kept; overlapping reruns rely on gateway deduplication
//! - A source failure aborts the run, a ticket failure only its record
//! - Each run classifies with one snapshot of the rule table

pub mod runner;
pub mod scheduler;

pub use runner::{describe, detect, DetectedIssue, Pipeline, RecordOutcome, RunReport};
pub use scheduler::Scheduler;
