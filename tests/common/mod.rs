//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use tracewatch::config::AppConfig;
use tracewatch::lifecycle::{startup, Shutdown};
use tracewatch::services::ServiceKind;
use tracewatch::ServiceServer;

/// In-process stand-in for the incident table API.
#[derive(Clone, Default)]
pub struct MockIncidentApi {
    pub tickets: Arc<Mutex<Vec<Value>>>,
    /// Status returned for every request; 0 means 201 Created.
    pub status: Arc<AtomicU16>,
    pub calls: Arc<AtomicUsize>,
}

impl MockIncidentApi {
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tickets(&self) -> Vec<Value> {
        self.tickets.lock().unwrap().clone()
    }
}

async fn create_incident(
    State(api): State<MockIncidentApi>,
    Json(ticket): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = api.calls.fetch_add(1, Ordering::SeqCst);
    let status = match api.status.load(Ordering::SeqCst) {
        0 => StatusCode::CREATED,
        code => StatusCode::from_u16(code).unwrap(),
    };
    if !status.is_success() {
        return (status, Json(json!({ "error": "unavailable" })));
    }

    api.tickets.lock().unwrap().push(ticket);
    let number = format!("INC{:07}", n + 1);
    (
        status,
        Json(json!({ "result": { "number": number, "sys_id": format!("sys-{}", n + 1) } })),
    )
}

/// Start the mock incident API on an ephemeral port; returns its endpoint URL.
pub async fn start_mock_incident_api() -> (String, MockIncidentApi) {
    let api = MockIncidentApi::default();
    let app = Router::new()
        .route("/api/now/table/incident", post(create_incident))
        .with_state(api.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api/now/table/incident"), api)
}

/// Config with the log sink and file source under `dir`.
pub fn test_config(dir: &Path, kind: ServiceKind) -> AppConfig {
    let mut config = AppConfig::default();
    let log_path = dir.join(format!("{}.log", kind.name()));
    config.service.name = kind.name().to_string();
    config.service.log_path = log_path.display().to_string();
    config.source.file_path = log_path.display().to_string();
    config
}

pub struct RunningService {
    pub addr: SocketAddr,
    pub log_path: PathBuf,
    pub shutdown: Shutdown,
}

impl RunningService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Spawn a service on an ephemeral port.
pub async fn spawn_service(config: &AppConfig, kind: ServiceKind) -> RunningService {
    let logger = startup::open_sink(config).unwrap();
    let log_path = logger.path().to_path_buf();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ServiceServer::new(kind, config, logger);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    RunningService {
        addr,
        log_path,
        shutdown,
    }
}

/// Parsed records of a service's sink.
pub fn read_records(path: &Path) -> Vec<tracewatch::logging::LogRecord> {
    tracewatch::source::file::read_tail_lines(path, 10_000)
        .unwrap()
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
