//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `tickets.password`.
pub const TICKET_PASSWORD_ENV: &str = "TRACEWATCH_TICKET_PASSWORD";

/// Environment variable overriding `source.index_password`.
pub const INDEX_PASSWORD_ENV: &str = "TRACEWATCH_INDEX_PASSWORD";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply secret overrides and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Secrets are usually injected through the environment rather than the file.
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(password) = std::env::var(TICKET_PASSWORD_ENV) {
        config.tickets.password = password;
    }
    if let Ok(password) = std::env::var(INDEX_PASSWORD_ENV) {
        config.source.index_password = password;
    }
}
