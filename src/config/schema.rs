//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the services and
//! the incident pipeline. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

use crate::classifier::IssueRule;

/// Root configuration shared by every binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Service identity, bind address and log sink.
    pub service: ServiceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Which log source the pipeline reads from.
    pub source: SourceConfig,

    /// Classifier rule table extensions.
    pub classifier: ClassifierConfig,

    /// Incident API and deduplication settings.
    pub tickets: TicketConfig,

    /// Retry configuration for ticket submission.
    pub retries: RetryConfig,

    /// Pipeline batching and scheduling.
    pub pipeline: PipelineConfig,

    /// Payment service business rules.
    pub payment: PaymentConfig,
}

/// Service host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name stamped on every log record (e.g., "payment").
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8003").
    pub bind_address: String,

    /// Path of the append-only structured log sink.
    pub log_path: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "payment".to_string(),
            bind_address: "0.0.0.0:8003".to_string(),
            log_path: "/var/log/app.log".to_string(),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Outbound call timeout (incident API, index queries) in seconds.
    pub outbound_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            outbound_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    pub log_filter: String,

    /// Emit diagnostic logs as JSON instead of the human format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "tracewatch=info,tower_http=info".to_string(),
            json_logs: false,
        }
    }
}

/// Log source backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceBackend {
    /// Bounded tail over a local structured log file.
    #[default]
    File,
    /// Bulk query against an external search index.
    Index,
}

/// Log source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Active backend; only one is used per pipeline.
    pub backend: SourceBackend,

    /// Log file read by the `file` backend.
    pub file_path: String,

    /// Search endpoint for the `index` backend.
    pub index_url: String,

    pub index_username: String,

    pub index_password: String,

    /// Restrict index queries to one service.
    pub service_filter: Option<String>,

    /// Restrict index queries to one level (e.g., "WARN").
    pub level_filter: Option<String>,

    /// Only return index records newer than this many seconds.
    pub lookback_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: SourceBackend::File,
            file_path: "/var/log/app.log".to_string(),
            index_url: "http://localhost:9200/logs-*/_search".to_string(),
            index_username: "elastic".to_string(),
            index_password: String::new(),
            service_filter: None,
            level_filter: None,
            lookback_secs: None,
        }
    }
}

/// Classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Start from the built-in payment rule table.
    pub include_defaults: bool,

    /// Rules appended after the defaults, in order.
    pub rules: Vec<IssueRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            include_defaults: true,
            rules: Vec::new(),
        }
    }
}

/// Incident API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TicketConfig {
    /// Incident table endpoint.
    pub endpoint: String,

    pub username: String,

    pub password: String,

    pub urgency: String,

    pub impact: String,

    /// Category sent in the ticket body.
    pub category: String,

    /// Deduplication window in seconds.
    pub dedupe_window_secs: u64,

    /// JSON file of issued tickets shared by `incident-scan` runs.
    /// Empty keeps dedupe state in memory only.
    pub state_path: String,

    /// How long to wait for another run's lock on `state_path`.
    pub lock_wait_secs: u64,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://example.service-now.com/api/now/table/incident".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            urgency: "2".to_string(),
            impact: "2".to_string(),
            category: "Software".to_string(),
            dedupe_window_secs: 3600,
            state_path: "tracewatch-tickets.json".to_string(),
            lock_wait_secs: 30,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum attempts including the first one.
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,

    /// Fraction of submissions that may be retried (0.0 - 1.0).
    pub budget_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
            budget_ratio: 0.2,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records pulled from the source per run.
    pub batch_size: usize,

    /// Maximum records classified and submitted in parallel.
    pub concurrency: usize,

    /// Interval between runs in watch mode, in seconds.
    pub interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            concurrency: 4,
            interval_secs: 60,
        }
    }
}

/// Payment service business rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Amounts above this are blocked as fraud.
    pub fraud_threshold: f64,

    /// Order ids ending with this suffix are duplicates.
    pub duplicate_suffix: String,

    /// Probability of a simulated charge failure (0.0 disables it).
    pub failure_rate: f64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            fraud_threshold: 50_000.0,
            duplicate_suffix: "DUP".to_string(),
            failure_rate: 0.0,
        }
    }
}
