//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env secret overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → sections handed to each subsystem
//!
//! In watch mode:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → scheduler swaps the classifier rule table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, ClassifierConfig, ObservabilityConfig, PaymentConfig, PipelineConfig,
    RetryConfig, ServiceConfig, SourceBackend, SourceConfig, TicketConfig, TimeoutConfig,
};
