//! Correlation middleware.
//!
//! Wraps every route of a service: builds the [`CorrelationContext`], times the
//! round trip, writes exactly one summary record and stamps `x-trace-id` on the
//! response.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::correlation::context::{CorrelationContext, X_TRACE_ID, X_USER_ID};
use crate::logging::{LogLevel, LogRecord, StructuredLogger};
use crate::observability::metrics;

pub async fn correlation_middleware(
    State(logger): State<Arc<StructuredLogger>>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = CorrelationContext::from_headers(request.headers());
    let route = request.uri().path().to_string();
    let method = request.method().to_string();

    request.extensions_mut().insert(ctx.clone());

    let timer = RequestTimer::start(logger, ctx.clone(), route, method);
    let mut response = next.run(request).await;

    let identified = response
        .headers()
        .get(X_USER_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    timer.finish(response.status(), identified.as_deref());

    if let Some(value) = ctx.trace_header() {
        response.headers_mut().insert(X_TRACE_ID, value);
    }
    response
}

/// Scoped request timer.
///
/// `finish` writes the summary record for a completed request. If the timer is
/// dropped without finishing (handler panic, timeout, client disconnect) the
/// record is written from `Drop` with `outcome=aborted`.
pub struct RequestTimer {
    logger: Arc<StructuredLogger>,
    ctx: CorrelationContext,
    route: String,
    method: String,
    started: Instant,
    finished: bool,
}

impl RequestTimer {
    pub fn start(
        logger: Arc<StructuredLogger>,
        ctx: CorrelationContext,
        route: String,
        method: String,
    ) -> Self {
        Self {
            logger,
            ctx,
            route,
            method,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Record a completed request. `identified_user` overrides an unknown caller.
    pub fn finish(mut self, status: StatusCode, identified_user: Option<&str>) {
        self.finished = true;

        let level = if status.is_server_error() {
            LogLevel::Error
        } else if status.is_client_error() {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };

        let mut record = self
            .summary(level, "request completed")
            .with_field("status", status.as_u16());
        if let Some(user) = identified_user.filter(|_| !self.ctx.is_identified()) {
            record = record.with_user(user);
        }

        metrics::record_request(self.logger.service(), &self.route, status.as_u16(), self.started);
        self.logger.emit(record);
    }

    fn summary(&self, level: LogLevel, message: &str) -> LogRecord {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.logger
            .record(&self.ctx, &self.route, level, message)
            .with_duration_ms((elapsed_ms * 100.0).round() / 100.0)
            .with_field("event", "http_request")
            .with_field("method", &self.method)
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let record = self
            .summary(LogLevel::Error, "request aborted")
            .with_field("outcome", "aborted");
        metrics::record_request(self.logger.service(), &self.route, 0, self.started);
        self.logger.emit(record);
    }
}
