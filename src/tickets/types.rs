//! Ticket data types and errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::logging::LogRecord;

/// Deterministic key for "the same issue instance".
///
/// Category and correlator stay separate so a `|` inside either one cannot
/// make two different pairs collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupeKey {
    category: String,
    correlator: String,
}

impl DedupeKey {
    pub fn new(category: &str, correlator: &str) -> Self {
        Self {
            category: category.to_string(),
            correlator: correlator.to_string(),
        }
    }

    /// Key for `category` detected in `record`.
    pub fn for_record(category: &str, record: &LogRecord) -> Self {
        Self::new(category, &business_correlator(record))
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn correlator(&self) -> &str {
        &self.correlator
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.category, self.correlator)
    }
}

/// The most specific identifier available in a record.
///
/// Order id field, then an `order_id=` token in the message, then the trace id
/// (field or `[trace=...]` token), then the message itself.
pub fn business_correlator(record: &LogRecord) -> String {
    if let Some(order_id) = record.field("order_id").filter(|v| !v.is_empty()) {
        return order_id.to_string();
    }
    if let Some(order_id) = token_value(&record.message, "order_id=", "") {
        return order_id.to_string();
    }
    if !record.trace_id.is_empty() {
        return record.trace_id.clone();
    }
    if let Some(trace_id) = token_value(&record.message, "[trace=", "]") {
        return trace_id.to_string();
    }
    record.message.trim().to_string()
}

fn token_value<'a>(message: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    message.split_whitespace().find_map(|token| {
        let value = token.strip_prefix(prefix)?;
        let value = value.strip_suffix(suffix).unwrap_or(value);
        let value = value.trim_end_matches([',', ';']);
        (!value.is_empty()).then_some(value)
    })
}

/// Body sent to the incident API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub short_description: String,
    pub description: String,
    pub urgency: String,
    pub impact: String,
    pub category: String,
    #[serde(skip)]
    pub dedupe_key: DedupeKey,
}

/// Reference to a created ticket.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TicketRef {
    pub number: Option<String>,
    pub sys_id: Option<String>,
}

#[derive(Deserialize)]
struct CreateResponse {
    result: TicketRef,
}

impl TicketRef {
    /// Parse `{"result": {"number": ..., "sys_id": ...}}`; unknown shapes give an
    /// empty reference rather than an error, since the ticket was created.
    pub fn from_response_body(body: &str) -> Self {
        serde_json::from_str::<CreateResponse>(body)
            .map(|r| r.result)
            .unwrap_or_default()
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.number, &self.sys_id) {
            (Some(number), _) => f.write_str(number),
            (None, Some(sys_id)) => f.write_str(sys_id),
            (None, None) => f.write_str("<unknown>"),
        }
    }
}

/// Result of a gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketOutcome {
    pub reference: TicketRef,
    /// True when an earlier ticket inside the window was reused.
    pub deduplicated: bool,
}

/// Ticket creation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateTicketError {
    #[error("incident API rejected ticket with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("incident API unreachable: {0}")]
    Transport(String),

    #[error("invalid incident request: {0}")]
    Build(String),
}

impl From<reqwest::Error> for CreateTicketError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            CreateTicketError::Build(e.to_string())
        } else {
            CreateTicketError::Transport(e.to_string())
        }
    }
}
