//! Startup helpers shared by the binaries.

use std::path::Path;
use std::sync::Arc;

use crate::config::loader::parse_config;
use crate::config::{load_config, AppConfig, ConfigError};
use crate::logging::{LogError, StructuredLogger};

/// Load `path`, or start from defaults when no file is given.
///
/// Environment overrides and validation apply either way.
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(path) => load_config(path)?,
        None => parse_config("")?,
    };

    tracing::debug!(
        service = %config.service.name,
        source = ?config.source.backend,
        "Configuration loaded"
    );
    Ok(config)
}

/// Open the service's structured log sink.
pub fn open_sink(config: &AppConfig) -> Result<Arc<StructuredLogger>, LogError> {
    let logger = StructuredLogger::open(config.service.name.as_str(), &config.service.log_path)?;
    tracing::info!(
        service = %config.service.name,
        path = %logger.path().display(),
        "Structured log sink opened"
    );
    Ok(Arc::new(logger))
}
