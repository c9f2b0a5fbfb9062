//! Retry policy for outbound ticket submission.
//!
//! # Design Decisions
//! - Only transport errors, 429 and 5xx are retried; a 4xx means the request
//!   itself is wrong and will fail again
//! - The budget caps retries to a fraction of first attempts

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::RetryConfig;
use crate::tickets::CreateTicketError;

/// Whether a failed submission is worth another attempt.
pub fn is_retryable(error: &CreateTicketError) -> bool {
    match error {
        CreateTicketError::Transport(_) => true,
        CreateTicketError::Rejected { status, .. } => *status == 429 || *status >= 500,
        CreateTicketError::Build(_) => false,
    }
}

/// Ratio-based retry budget.
///
/// Every first attempt deposits `ratio` tokens; every retry withdraws one.
/// `min_retries` tokens are always available so a quiet system can still retry.
pub struct RetryBudget {
    ratio: f64,
    min_retries: u64,
    requests: AtomicU64,
    retries: AtomicU64,
}

impl RetryBudget {
    pub fn new(ratio: f64, min_retries: u64) -> Self {
        Self {
            ratio,
            min_retries,
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.budget_ratio, 10)
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Try to withdraw one retry from the budget.
    pub fn try_retry(&self) -> bool {
        let requests = self.requests.load(Ordering::Relaxed);
        let allowed = self.min_retries + (requests as f64 * self.ratio) as u64;

        self.retries
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                (used < allowed).then_some(used + 1)
            })
            .is_ok()
    }
}
