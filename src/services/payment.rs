//! Payment service: charge validation and simulated failures.
//!
//! A charge passes through [`CHARGE_CHECKS`] in order; the first failing check
//! decides the response. Precedence comes from the table alone.

use axum::{extract::State, routing::post, Extension, Json, Router};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::correlation::CorrelationContext;
use crate::logging::{LogLevel, StructuredLogger};
use crate::services::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeRequest {
    pub id: String,
    pub order_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    InvalidAmount,
    FraudBlocked,
    DuplicateTransaction,
}

impl ValidationFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "InvalidAmount",
            Self::FraudBlocked => "FraudBlocked",
            Self::DuplicateTransaction => "DuplicateTransaction",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "Amount must be greater than zero",
            Self::FraudBlocked => "Transaction flagged by fraud detection system",
            Self::DuplicateTransaction => "This transaction appears to be duplicated",
        }
    }
}

type Check = fn(&PaymentPolicy, &ChargeRequest) -> bool;

/// Validation checks, evaluated in order.
pub const CHARGE_CHECKS: [(ValidationFailure, Check); 3] = [
    (ValidationFailure::InvalidAmount, |_, req| !(req.amount > 0.0)),
    (ValidationFailure::FraudBlocked, |policy, req| req.amount > policy.fraud_threshold),
    (ValidationFailure::DuplicateTransaction, |policy, req| {
        !policy.duplicate_suffix.is_empty() && req.order_id.ends_with(&policy.duplicate_suffix)
    }),
];

/// Decides whether an otherwise valid charge fails.
pub trait FailureInjector: Send + Sync {
    fn should_fail(&self) -> bool;
}

/// Fails a fixed fraction of charges.
#[derive(Debug, Clone, Copy)]
pub struct FailureRate(f64);

impl FailureRate {
    pub fn new(rate: f64) -> Self {
        Self(rate)
    }
}

impl FailureInjector for FailureRate {
    fn should_fail(&self) -> bool {
        // NaN and non-positive rates never fail.
        self.0 > 0.0 && rand::thread_rng().gen::<f64>() < self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FailureInjector for NeverFail {
    fn should_fail(&self) -> bool {
        false
    }
}

/// Charge rules for one payment service.
pub struct PaymentPolicy {
    pub fraud_threshold: f64,
    pub duplicate_suffix: String,
    failure: Arc<dyn FailureInjector>,
}

impl PaymentPolicy {
    pub fn from_config(config: &PaymentConfig) -> Self {
        Self {
            fraud_threshold: config.fraud_threshold,
            duplicate_suffix: config.duplicate_suffix.clone(),
            failure: Arc::new(FailureRate::new(config.failure_rate)),
        }
    }

    pub fn with_failure(mut self, failure: Arc<dyn FailureInjector>) -> Self {
        self.failure = failure;
        self
    }

    /// First failing check, if any.
    pub fn validate(&self, request: &ChargeRequest) -> Option<ValidationFailure> {
        CHARGE_CHECKS
            .iter()
            .find(|(_, failed)| failed(self, request))
            .map(|(failure, _)| *failure)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChargeResponse {
    Error {
        error_type: &'static str,
        message: &'static str,
    },
    Failed {
        payment_id: String,
    },
    Ok {
        payment_id: String,
        charged: f64,
    },
}

pub fn routes() -> Router<ServiceState> {
    Router::new().route("/charge", post(charge))
}

async fn charge(
    State(state): State<ServiceState>,
    Extension(ctx): Extension<CorrelationContext>,
    Json(request): Json<ChargeRequest>,
) -> Json<ChargeResponse> {
    Json(process_charge(&state.payment, &state.logger, &ctx, &request))
}

/// Run a charge and append its business record.
pub fn process_charge(
    policy: &PaymentPolicy,
    logger: &StructuredLogger,
    ctx: &CorrelationContext,
    request: &ChargeRequest,
) -> ChargeResponse {
    let record = |level, message: &str, event: &str, error_type: &str| {
        logger
            .record(ctx, "/charge", level, message)
            .with_field("event", event)
            .with_field("error_type", error_type)
            .with_field("order_id", &request.order_id)
            .with_field("amount", request.amount)
    };

    if let Some(failure) = policy.validate(request) {
        logger.emit(record(LogLevel::Warn, "payment rejected", "payment_validation", failure.as_str()));
        return ChargeResponse::Error {
            error_type: failure.as_str(),
            message: failure.message(),
        };
    }

    if policy.failure.should_fail() {
        logger.emit(record(LogLevel::Error, "payment failed", "payment_failure", "RandomFail"));
        return ChargeResponse::Failed {
            payment_id: request.id.clone(),
        };
    }

    logger.emit(record(LogLevel::Info, "payment succeeded", "payment_success", "None"));
    ChargeResponse::Ok {
        payment_id: request.id.clone(),
        charged: request.amount,
    }
}
