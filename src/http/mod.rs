//! HTTP hosting for the demo services.
//!
//! # Data Flow
//! ```text
//! TcpListener
//!     → server.rs (TraceLayer → correlation → body limit → timeout)
//!     → services::<kind>::routes
//! ```

pub mod server;

pub use server::ServiceServer;
