//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (diagnostic `tracing` events)
//!     → metrics.rs (counters, histograms)
//!
//! Request-level structured records go to `crate::logging` instead; they are
//! mirrored into the diagnostic stream.
//! ```
//!
//! # Design Decisions
//! - One explicit initializer, called once at process start
//! - Trace id flows through every record as a field
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
