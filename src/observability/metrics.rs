//! Metrics collection.
//!
//! # Metrics
//! - `tracewatch_requests_total` (counter): requests by service, route, status
//! - `tracewatch_request_duration_seconds` (histogram): latency distribution
//! - `tracewatch_issues_detected_total` (counter): classified records by category
//! - `tracewatch_tickets_total` (counter): gateway outcomes (created, deduplicated, failed)
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; no exporter is installed here, so
//!   updates are no-ops until a host application installs a recorder
//! - Labels for service, route, status code and outcome

use std::time::Instant;

/// Record a completed request. `status` 0 means the request was aborted.
pub fn record_request(service: &str, route: &str, status: u16, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    let status = status.to_string();

    metrics::counter!(
        "tracewatch_requests_total",
        "service" => service.to_string(),
        "route" => route.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "tracewatch_request_duration_seconds",
        "service" => service.to_string(),
        "route" => route.to_string(),
        "status" => status
    )
    .record(duration);
}

/// Record a log record classified into `category`.
pub fn record_issue(category: &str) {
    metrics::counter!("tracewatch_issues_detected_total", "category" => category.to_string())
        .increment(1);
}

/// Record a ticket gateway outcome.
pub fn record_ticket(outcome: &'static str) {
    metrics::counter!("tracewatch_tickets_total", "outcome" => outcome).increment(1);
}
