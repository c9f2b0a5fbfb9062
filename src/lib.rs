//! Request correlation and log-driven incident filing.
//!
//! Services share one correlation middleware that threads a trace id through
//! every request and writes structured JSON-lines records. A separate pipeline
//! scans those records, classifies known failure patterns and files
//! deduplicated incident tickets.

// Request path
pub mod correlation;
pub mod http;
pub mod logging;
pub mod services;

// Incident pipeline
pub mod classifier;
pub mod pipeline;
pub mod source;
pub mod tickets;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::AppConfig;
pub use correlation::CorrelationContext;
pub use http::ServiceServer;
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;
