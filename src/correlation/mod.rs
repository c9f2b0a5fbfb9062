//! Request correlation subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → middleware.rs (read x-trace-id / x-user-id, build context)
//!     → context.rs (CorrelationContext, request extension only)
//!     → business handler (Extension<CorrelationContext>)
//!     → propagate.rs (same trace id on every downstream call)
//!     → middleware.rs (one summary record, x-trace-id on response)
//! ```
//!
//! # Design Decisions
//! - Flat causal chain: one token per chain, no span tree
//! - Context is never stored outside the request; it travels as a value
//! - The summary record is emitted by a drop guard so every exit path logs once

pub mod context;
pub mod middleware;
pub mod propagate;

pub use context::{CorrelationContext, UNKNOWN_USER, X_TRACE_ID, X_USER_ID};
pub use middleware::{correlation_middleware, RequestTimer};
pub use propagate::{CorrelatedRequest, ServiceClient};
