//! Deduplicating ticket gateway.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::{RetryConfig, TicketConfig};
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::retries::{is_retryable, RetryBudget};
use crate::tickets::client::IncidentApi;
use crate::tickets::store::{StoreError, StoredTicket, TicketStore};
use crate::tickets::types::{CreateTicketError, DedupeKey, Ticket, TicketOutcome, TicketRef};

/// A ticket issued for a key, and when.
struct Issued {
    reference: TicketRef,
    at: Instant,
}

#[derive(Default)]
struct SlotState {
    issued: Option<Issued>,
    /// Error of the most recent flight, tagged with its flight number.
    failure: Option<(u64, CreateTicketError)>,
}

/// One lock per dedupe key. Holding it across the outbound call is what makes
/// concurrent callers for the same key collapse into one call.
#[derive(Default)]
struct SlotInner {
    /// Completed outbound flights. Bumped while the lock is still held.
    flights: AtomicU64,
    state: Mutex<SlotState>,
}

type Slot = Arc<SlotInner>;

struct Retries {
    max_attempts: u32,
    budget: RetryBudget,
    backoff: Backoff,
}

struct Persistence {
    store: TicketStore,
    tickets: std::sync::Mutex<BTreeMap<DedupeKey, StoredTicket>>,
}

/// Idempotent front door to the incident API.
pub struct TicketGateway {
    api: Arc<dyn IncidentApi>,
    urgency: String,
    impact: String,
    category: String,
    window: Duration,
    slots: DashMap<DedupeKey, Slot>,
    retries: Option<Retries>,
    persistence: Option<Persistence>,
}

impl TicketGateway {
    pub fn new(api: Arc<dyn IncidentApi>, config: &TicketConfig) -> Self {
        Self {
            api,
            urgency: config.urgency.clone(),
            impact: config.impact.clone(),
            category: config.category.clone(),
            window: Duration::from_secs(config.dedupe_window_secs),
            slots: DashMap::new(),
            retries: None,
            persistence: None,
        }
    }

    /// Enable backoff retries when `config.enabled` is set.
    pub fn with_retries(mut self, config: &RetryConfig) -> Self {
        self.retries = config.enabled.then(|| Retries {
            budget: RetryBudget::from_config(config),
            backoff: Backoff::from_config(config),
            max_attempts: config.max_attempts,
        });
        self
    }

    /// Seed the slots from `store` and record every new ticket into it.
    ///
    /// Entries older than the window are dropped. Callers sharing a store
    /// across processes must hold its [`RunLock`](crate::tickets::RunLock).
    pub fn with_store(mut self, store: TicketStore) -> Result<Self, StoreError> {
        let now = Utc::now();
        let mut tickets = BTreeMap::new();

        for entry in store.load()? {
            // Clock skew can put created_at in the future; count that as brand new.
            let age = (now - entry.created_at).to_std().unwrap_or(Duration::ZERO);
            if age >= self.window {
                continue;
            }
            let at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
            let state = SlotState {
                issued: Some(Issued {
                    reference: entry.reference.clone(),
                    at,
                }),
                failure: None,
            };
            self.slots.insert(
                entry.key.clone(),
                Arc::new(SlotInner {
                    flights: AtomicU64::new(0),
                    state: Mutex::new(state),
                }),
            );
            tickets.insert(entry.key.clone(), entry);
        }

        tracing::info!(
            path = %store.path().display(),
            restored = tickets.len(),
            "Ticket state loaded"
        );
        self.persistence = Some(Persistence {
            store,
            tickets: std::sync::Mutex::new(tickets),
        });
        Ok(self)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.slots.len()
    }

    /// Create a ticket for `dedupe_key` unless one was created within the window.
    ///
    /// Callers that queue behind an in-flight call for the same key share its
    /// result, error included. A caller arriving after that flight finished
    /// makes a fresh attempt.
    pub async fn create(
        &self,
        category: &str,
        description: String,
        dedupe_key: DedupeKey,
    ) -> Result<TicketOutcome, CreateTicketError> {
        let slot = self.slots.entry(dedupe_key.clone()).or_default().clone();
        let seen = slot.flights.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(prev) = state.issued.as_ref().filter(|i| i.at.elapsed() < self.window) {
            tracing::debug!(
                dedupe_key = %dedupe_key,
                ticket = %prev.reference,
                "Ticket already created within window, skipping"
            );
            metrics::record_ticket("deduplicated");
            return Ok(TicketOutcome {
                reference: prev.reference.clone(),
                deduplicated: true,
            });
        }

        if let Some((_, error)) = state.failure.as_ref().filter(|(flight, _)| *flight > seen) {
            tracing::debug!(
                dedupe_key = %dedupe_key,
                error = %error,
                "Sharing failed result of concurrent ticket call"
            );
            metrics::record_ticket("failed");
            return Err(error.clone());
        }

        let ticket = Ticket {
            short_description: category.to_string(),
            description,
            urgency: self.urgency.clone(),
            impact: self.impact.clone(),
            category: self.category.clone(),
            dedupe_key,
        };

        let result = self.submit(&ticket).await;
        let flight = slot.flights.fetch_add(1, Ordering::AcqRel) + 1;

        match result {
            Ok(reference) => {
                tracing::info!(
                    dedupe_key = %ticket.dedupe_key,
                    ticket = %reference,
                    category = %category,
                    "Incident ticket created"
                );
                metrics::record_ticket("created");
                state.failure = None;
                state.issued = Some(Issued {
                    reference: reference.clone(),
                    at: Instant::now(),
                });
                self.persist(&ticket.dedupe_key, &reference);
                Ok(TicketOutcome {
                    reference,
                    deduplicated: false,
                })
            }
            Err(e) => {
                tracing::warn!(
                    dedupe_key = %ticket.dedupe_key,
                    error = %e,
                    "Failed to create incident ticket"
                );
                metrics::record_ticket("failed");
                state.failure = Some((flight, e.clone()));
                Err(e)
            }
        }
    }

    /// Record a new ticket in the store, if one is attached.
    ///
    /// A write failure is logged only: the ticket exists upstream either way.
    fn persist(&self, key: &DedupeKey, reference: &TicketRef) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let now = Utc::now();
        let mut tickets = persistence.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        tickets.insert(
            key.clone(),
            StoredTicket {
                key: key.clone(),
                reference: reference.clone(),
                created_at: now,
            },
        );
        tickets.retain(|_, t| (now - t.created_at).to_std().map_or(true, |age| age < self.window));

        let snapshot: Vec<StoredTicket> = tickets.values().cloned().collect();
        if let Err(e) = persistence.store.save(&snapshot) {
            tracing::error!(error = %e, dedupe_key = %key, "Failed to persist ticket state");
        }
    }

    async fn submit(&self, ticket: &Ticket) -> Result<TicketRef, CreateTicketError> {
        let Some(retries) = &self.retries else {
            return self.api.submit(ticket).await;
        };

        retries.budget.record_request();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.api.submit(ticket).await {
                Ok(reference) => return Ok(reference),
                Err(e)
                    if attempt < retries.max_attempts
                        && is_retryable(&e)
                        && retries.budget.try_retry() =>
                {
                    let delay = retries.backoff.delay(attempt);
                    tracing::info!(
                        dedupe_key = %ticket.dedupe_key,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Retrying ticket submission"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Forget keys whose ticket has left the window. Returns how many were dropped.
    ///
    /// A slot that another caller holds or is waiting on is kept.
    pub fn purge_expired(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.state.try_lock() {
                Ok(state) => state.issued.as_ref().is_some_and(|i| i.at.elapsed() < self.window),
                Err(_) => true,
            }
        });
        before.saturating_sub(self.slots.len())
    }
}
