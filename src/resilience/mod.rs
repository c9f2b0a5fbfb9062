//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Ticket submission:
//!     → retries.rs (is the failure retryable? is there budget left?)
//!     → backoff.rs (exponential delay with jitter before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Retries are opt-in; a failed ticket is otherwise left for the next run
//! - Jittered backoff prevents thundering herd
//! - Retry budget prevents retry storms when the incident API is down

pub mod backoff;
pub mod retries;
