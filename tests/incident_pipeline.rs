//! Service logs through the pipeline into a mock incident API.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use tracewatch::classifier::IssueClassifier;
use tracewatch::pipeline::{Pipeline, RecordOutcome};
use tracewatch::services::ServiceKind;
use tracewatch::source::FileTail;
use tracewatch::tickets::{ServiceNowClient, TicketGateway, TicketStore};
use tracewatch::AppConfig;

mod common;

fn pipeline(config: &AppConfig) -> Pipeline {
    build(config, None)
}

/// A pipeline as a separate `incident-scan` process would build it.
fn pipeline_with_store(config: &AppConfig) -> Pipeline {
    build(config, Some(TicketStore::new(&config.tickets.state_path)))
}

fn build(config: &AppConfig, store: Option<TicketStore>) -> Pipeline {
    let client = reqwest::Client::new();
    let api = Arc::new(ServiceNowClient::from_config(&config.tickets, client, Duration::from_secs(5)));
    let mut gateway = TicketGateway::new(api, &config.tickets).with_retries(&config.retries);
    if let Some(store) = store {
        gateway = gateway.with_store(store).unwrap();
    }
    let gateway = Arc::new(gateway);
    Pipeline::new(
        Arc::new(FileTail::new(&config.source.file_path)),
        IssueClassifier::from_config(&config.classifier),
        gateway,
        &config.pipeline,
    )
}

async fn drive_payments(service: &common::RunningService) {
    let client = reqwest::Client::new();
    let charges = [
        ("t-1", "ORDER_ZERO", 0),
        ("t-2", "ORDER123DUP", 150),
        ("t-3", "ORDER_FRAUD", 99999),
        ("t-4", "ORDER_SUCCESS", 499),
        // Same business failure under a new trace.
        ("t-5", "ORDER123DUP", 150),
    ];
    for (trace, order_id, amount) in charges {
        client
            .post(service.url("/charge"))
            .header("x-trace-id", trace)
            .json(&json!({ "id": "p", "order_id": order_id, "amount": amount }))
            .send()
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_payment_failures_become_deduplicated_tickets() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, api) = common::start_mock_incident_api().await;
    let mut config = common::test_config(dir.path(), ServiceKind::Payment);
    config.tickets.endpoint = endpoint;

    let service = common::spawn_service(&config, ServiceKind::Payment).await;
    drive_payments(&service).await;

    let pipeline = pipeline(&config);
    let report = pipeline.run_once().await.unwrap();

    // 5 business records + 5 summaries.
    assert_eq!(report.scanned, 10);
    assert_eq!(report.ticketed, 3);
    assert_eq!(report.deduplicated, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(api.calls(), 3);

    let tickets = api.tickets();
    let mut categories: Vec<&str> = tickets
        .iter()
        .map(|t| t["short_description"].as_str().unwrap())
        .collect();
    categories.sort();
    assert_eq!(
        categories,
        vec!["Duplicate Transaction", "Fraud Blocked", "Invalid Amount"]
    );
    for ticket in &tickets {
        assert!(ticket["description"].as_str().unwrap().starts_with("Timestamp: "));
        assert!(ticket.get("dedupe_key").is_none());
        assert_eq!(ticket["urgency"], "2");
    }

    // Rerun over the same window: nothing new.
    let rerun = pipeline.run_once().await.unwrap();
    assert_eq!(rerun.ticketed, 0);
    assert_eq!(rerun.deduplicated, 4);
    assert_eq!(api.calls(), 3);

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_rejected_tickets_do_not_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, api) = common::start_mock_incident_api().await;
    api.set_status(503);
    let mut config = common::test_config(dir.path(), ServiceKind::Payment);
    config.tickets.endpoint = endpoint;

    let service = common::spawn_service(&config, ServiceKind::Payment).await;
    drive_payments(&service).await;

    let pipeline = pipeline(&config);
    let report = pipeline.run_once().await.unwrap();
    assert_eq!(report.failed, 4);
    assert_eq!(report.ticketed, 0);
    assert!(report.outcomes.iter().any(|o| matches!(
        o,
        RecordOutcome::TicketFailed { error, .. } if error.to_string().contains("503")
    )));

    // The API recovers; failures were not cached.
    api.set_status(0);
    let recovered = pipeline.run_once().await.unwrap();
    assert_eq!(recovered.ticketed, 3);
    assert_eq!(recovered.deduplicated, 1);

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_separate_runs_share_ticket_state() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, api) = common::start_mock_incident_api().await;
    let mut config = common::test_config(dir.path(), ServiceKind::Payment);
    config.tickets.endpoint = endpoint;
    config.tickets.state_path = dir.path().join("tickets.json").display().to_string();

    let service = common::spawn_service(&config, ServiceKind::Payment).await;
    drive_payments(&service).await;

    let first = pipeline_with_store(&config).run_once().await.unwrap();
    assert_eq!(first.ticketed, 3);

    // A fresh pipeline has empty in-memory slots; the store still covers it.
    let second = pipeline_with_store(&config).run_once().await.unwrap();
    assert_eq!(second.ticketed, 0);
    assert_eq!(second.deduplicated, 4);
    assert_eq!(api.calls(), 3);

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_simultaneous_runs_serialize_on_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, api) = common::start_mock_incident_api().await;
    let mut config = common::test_config(dir.path(), ServiceKind::Payment);
    config.tickets.endpoint = endpoint;
    config.tickets.state_path = dir.path().join("tickets.json").display().to_string();

    let service = common::spawn_service(&config, ServiceKind::Payment).await;
    drive_payments(&service).await;

    let runs: Vec<_> = (0..2)
        .map(|_| {
            let config = config.clone();
            tokio::spawn(async move {
                let store = TicketStore::new(&config.tickets.state_path);
                let _lock = store.lock(Duration::from_secs(10)).await.unwrap();
                pipeline_with_store(&config).run_once().await.unwrap()
            })
        })
        .collect();

    let mut ticketed = 0;
    for run in runs {
        ticketed += run.await.unwrap().ticketed;
    }
    assert_eq!(ticketed, 3);
    assert_eq!(api.calls(), 3);

    service.shutdown.trigger();
}

#[tokio::test]
async fn test_missing_log_file_is_a_source_error() {
    let dir = tempfile::tempdir().unwrap();
    let (endpoint, api) = common::start_mock_incident_api().await;
    let mut config = common::test_config(dir.path(), ServiceKind::Payment);
    config.tickets.endpoint = endpoint;

    let pipeline = pipeline(&config);
    assert!(pipeline.run_once().await.is_err());
    assert_eq!(api.calls(), 0);
}
