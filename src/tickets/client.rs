//! Incident API client.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::TicketConfig;
use crate::tickets::types::{CreateTicketError, Ticket, TicketRef};

/// External incident system.
#[async_trait]
pub trait IncidentApi: Send + Sync {
    /// Create one ticket. No deduplication happens at this level.
    async fn submit(&self, ticket: &Ticket) -> Result<TicketRef, CreateTicketError>;
}

/// ServiceNow-style table API client (`POST /api/now/table/incident`).
pub struct ServiceNowClient {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    timeout: Duration,
}

impl ServiceNowClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            timeout,
        }
    }

    pub fn from_config(config: &TicketConfig, client: reqwest::Client, timeout: Duration) -> Self {
        Self::new(
            client,
            config.endpoint.as_str(),
            config.username.as_str(),
            config.password.as_str(),
            timeout,
        )
    }
}

#[async_trait]
impl IncidentApi for ServiceNowClient {
    async fn submit(&self, ticket: &Ticket) -> Result<TicketRef, CreateTicketError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(self.timeout)
            .json(ticket)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        match status {
            200 | 201 => Ok(TicketRef::from_response_body(&body)),
            _ => Err(CreateTicketError::Rejected { status, body }),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory incident API that counts calls and can fail on demand.
    #[derive(Default)]
    pub(crate) struct MockIncidentApi {
        calls: AtomicUsize,
        pub(crate) delay: Option<Duration>,
        failures: Mutex<VecDeque<CreateTicketError>>,
        submitted: Mutex<Vec<Ticket>>,
    }

    impl MockIncidentApi {
        pub(crate) fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        /// Queue errors returned by the next calls, in order.
        pub(crate) fn fail_next(&self, error: CreateTicketError) {
            self.failures.lock().unwrap().push_back(error);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn submitted(&self) -> Vec<Ticket> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IncidentApi for MockIncidentApi {
        async fn submit(&self, ticket: &Ticket) -> Result<TicketRef, CreateTicketError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            self.submitted.lock().unwrap().push(ticket.clone());
            Ok(TicketRef {
                number: Some(format!("INC{n:07}")),
                sys_id: None,
            })
        }
    }
}
