//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, rates within 0..=1)
//! - Validate endpoint URLs and classifier rules
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{AppConfig, SourceBackend};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.outbound_secs == 0 {
        errors.push(ValidationError::new("timeouts.outbound_secs", "must be > 0"));
    }

    if config.source.backend == SourceBackend::Index {
        check_url(&mut errors, "source.index_url", &config.source.index_url);
    }

    if !config.classifier.include_defaults && config.classifier.rules.is_empty() {
        errors.push(ValidationError::new(
            "classifier.rules",
            "at least one rule is required when defaults are disabled",
        ));
    }
    for (i, rule) in config.classifier.rules.iter().enumerate() {
        if rule.category.trim().is_empty() {
            errors.push(ValidationError::new(
                &format!("classifier.rules[{i}].category"),
                "must not be empty",
            ));
        }
        if rule.keywords.iter().all(|k| k.trim().is_empty()) {
            errors.push(ValidationError::new(
                &format!("classifier.rules[{i}].keywords"),
                "must contain a non-empty keyword",
            ));
        }
    }

    check_url(&mut errors, "tickets.endpoint", &config.tickets.endpoint);
    if config.tickets.dedupe_window_secs == 0 {
        errors.push(ValidationError::new("tickets.dedupe_window_secs", "must be > 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if !(0.0..=1.0).contains(&config.retries.budget_ratio) {
        errors.push(ValidationError::new("retries.budget_ratio", "must be within 0.0..=1.0"));
    }

    if config.pipeline.batch_size == 0 {
        errors.push(ValidationError::new("pipeline.batch_size", "must be > 0"));
    }
    if config.pipeline.concurrency == 0 {
        errors.push(ValidationError::new("pipeline.concurrency", "must be > 0"));
    }
    if config.pipeline.interval_secs == 0 {
        errors.push(ValidationError::new("pipeline.interval_secs", "must be > 0"));
    }

    if !(0.0..=1.0).contains(&config.payment.failure_rate) {
        errors.push(ValidationError::new("payment.failure_rate", "must be within 0.0..=1.0"));
    }
    if config.payment.fraud_threshold <= 0.0 {
        errors.push(ValidationError::new("payment.fraud_threshold", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match url::Url::parse(value) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        Ok(u) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {e}"))),
    }
}
