//! Incident ticket subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline (category, description, dedupe key)
//!     → gateway.rs (per-key slot: window check, single-flight)
//!     → client.rs (authenticated POST to the incident API)
//!     → types.rs (Ticket body, TicketRef parsed from the response)
//!     → store.rs (issued tickets persisted for the next process)
//! ```
//!
//! # Design Decisions
//! - Deduplication is the only guard against duplicate tickets, because the
//!   pipeline keeps no read offset and reruns overlap
//! - Concurrent callers with one key share one outbound call and its result
//! - A failure is shared only with callers that queued behind it; a rerun retries
//! - Separate processes see each other's tickets through the store, one writer
//!   at a time

pub mod client;
pub mod gateway;
pub mod store;
pub mod types;

pub use client::{IncidentApi, ServiceNowClient};
pub use gateway::TicketGateway;
pub use store::{RunLock, StoreError, StoredTicket, TicketStore};
pub use types::{business_correlator, CreateTicketError, DedupeKey, Ticket, TicketOutcome, TicketRef};
