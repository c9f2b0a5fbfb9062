//! Demo business services.
//!
//! # Data Flow
//! ```text
//! Request → correlation middleware (context, timer)
//!     → handler (Extension<CorrelationContext>, State<ServiceState>)
//!         → business records appended to the service's log sink
//!     → summary record + x-trace-id on the way out
//! ```
//!
//! Every service also serves `/health` and `/logs`.

pub mod auth;
pub mod notify;
pub mod order;
pub mod payment;

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::correlation::CorrelationContext;
use crate::logging::{LogLevel, StructuredLogger};
use crate::source::FileTail;

pub use payment::{FailureInjector, FailureRate, NeverFail, PaymentPolicy};

/// Lines returned by `/logs` when `lines` is not given.
pub const DEFAULT_LOG_LINES: usize = 50;

/// The four demo services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ServiceKind {
    Auth,
    Order,
    Payment,
    Notify,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [Self::Auth, Self::Order, Self::Payment, Self::Notify];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Order => "order",
            Self::Payment => "payment",
            Self::Notify => "notify",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Auth => 8001,
            Self::Order => 8002,
            Self::Payment => 8003,
            Self::Notify => 8004,
        }
    }

    /// Business routes plus `/health` and `/logs`.
    pub fn routes(&self) -> Router<ServiceState> {
        let business = match self {
            Self::Auth => auth::routes(),
            Self::Order => order::routes(),
            Self::Payment => payment::routes(),
            Self::Notify => notify::routes(),
        };
        business
            .route("/health", get(health))
            .route("/logs", get(logs))
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State shared by a service's handlers.
#[derive(Clone)]
pub struct ServiceState {
    pub kind: ServiceKind,
    pub logger: Arc<StructuredLogger>,
    pub payment: Arc<PaymentPolicy>,
}

impl ServiceState {
    pub fn new(kind: ServiceKind, logger: Arc<StructuredLogger>, payment: PaymentPolicy) -> Self {
        Self {
            kind,
            logger,
            payment: Arc::new(payment),
        }
    }
}

async fn health(
    State(state): State<ServiceState>,
    Extension(ctx): Extension<CorrelationContext>,
) -> Json<Value> {
    state
        .logger
        .emit(state.logger.record(&ctx, "/health", LogLevel::Info, "health check"));
    Json(json!({ "status": "ok", "service": state.kind.name() }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<usize>,
}

/// Last `lines` raw records of this service's sink.
async fn logs(State(state): State<ServiceState>, Query(query): Query<LogsQuery>) -> Json<Value> {
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    match FileTail::new(state.logger.path()).tail_lines(lines).await {
        Ok(lines) => Json(json!({ "logs": lines })),
        Err(e) => {
            tracing::warn!(service = %state.kind, error = %e, "Failed to read log tail");
            Json(json!({ "error": e.to_string() }))
        }
    }
}
