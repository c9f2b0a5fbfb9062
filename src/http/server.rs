//! HTTP host for one demo service.
//!
//! # Responsibilities
//! - Build the service router with its middleware stack
//! - Bind to a listener and serve until shutdown

use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::correlation::correlation_middleware;
use crate::logging::StructuredLogger;
use crate::services::{PaymentPolicy, ServiceKind, ServiceState};

/// HTTP server for a single service.
pub struct ServiceServer {
    kind: ServiceKind,
    router: Router,
}

impl ServiceServer {
    /// Build a server for `kind` writing to `logger`.
    pub fn new(kind: ServiceKind, config: &AppConfig, logger: Arc<StructuredLogger>) -> Self {
        let state = ServiceState::new(kind, logger, PaymentPolicy::from_config(&config.payment));
        Self::with_state(state, config)
    }

    /// Build a server around prepared state (e.g. a custom failure injector).
    pub fn with_state(state: ServiceState, config: &AppConfig) -> Self {
        let kind = state.kind;
        let router = Self::build_router(
            state,
            Duration::from_secs(config.timeouts.request_secs),
            config.service.max_body_size,
        );
        Self { kind, router }
    }

    /// Outermost first: tracing, correlation, body limit, timeout.
    ///
    /// The timeout sits inside the correlation layer so a timed-out request still
    /// gets its summary record and `x-trace-id`.
    #[allow(deprecated)]
    fn build_router(state: ServiceState, request_timeout: Duration, max_body_size: usize) -> Router {
        let logger = state.logger.clone();
        state
            .kind
            .routes()
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(middleware::from_fn_with_state(logger, correlation_middleware))
            .layer(TraceLayer::new_for_http())
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(service = %self.kind, address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(service = %self.kind, "HTTP server stopped");
        Ok(())
    }
}
