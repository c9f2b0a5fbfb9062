//! Single pipeline run.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;

use crate::classifier::IssueClassifier;
use crate::config::PipelineConfig;
use crate::logging::LogRecord;
use crate::observability::metrics;
use crate::source::{LogSource, SourceError};
use crate::tickets::{CreateTicketError, DedupeKey, TicketGateway, TicketOutcome};

/// A record that matched a rule.
#[derive(Debug, Clone)]
pub struct DetectedIssue<'a> {
    pub category: String,
    pub source_record: &'a LogRecord,
    pub description: String,
}

/// Final state of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Ignored,
    Ticketed {
        category: String,
        dedupe_key: DedupeKey,
        outcome: TicketOutcome,
    },
    TicketFailed {
        category: String,
        dedupe_key: DedupeKey,
        error: CreateTicketError,
    },
}

/// Summary of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub scanned: usize,
    pub ignored: usize,
    /// New tickets created.
    pub ticketed: usize,
    /// Records whose ticket already existed within the window.
    pub deduplicated: usize,
    pub failed: usize,
    /// Outcomes in source order.
    pub outcomes: Vec<RecordOutcome>,
}

impl RunReport {
    fn from_outcomes(outcomes: Vec<RecordOutcome>) -> Self {
        let mut report = RunReport {
            scanned: outcomes.len(),
            ..RunReport::default()
        };
        for outcome in &outcomes {
            match outcome {
                RecordOutcome::Ignored => report.ignored += 1,
                RecordOutcome::Ticketed { outcome, .. } if outcome.deduplicated => report.deduplicated += 1,
                RecordOutcome::Ticketed { .. } => report.ticketed += 1,
                RecordOutcome::TicketFailed { .. } => report.failed += 1,
            }
        }
        report.outcomes = outcomes;
        report
    }
}

/// Ticket description for an issue.
pub fn describe(timestamp: DateTime<Utc>, category: &str, message: &str) -> String {
    format!(
        "Timestamp: {}\nDetected Issue: {}\nLog Message:\n{}\n",
        timestamp.to_rfc3339(),
        category,
        message
    )
}

/// Classify one record.
pub fn detect<'a>(classifier: &IssueClassifier, record: &'a LogRecord) -> Option<DetectedIssue<'a>> {
    let message = record.full_message();
    let category = classifier.classify(&message)?.to_string();
    let description = describe(record.timestamp, &category, &message);

    Some(DetectedIssue {
        category,
        source_record: record,
        description,
    })
}

/// LogSource → IssueClassifier → TicketGateway.
pub struct Pipeline {
    source: Arc<dyn LogSource>,
    classifier: ArcSwap<IssueClassifier>,
    gateway: Arc<TicketGateway>,
    batch_size: usize,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn LogSource>,
        classifier: IssueClassifier,
        gateway: Arc<TicketGateway>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            classifier: ArcSwap::from_pointee(classifier),
            gateway,
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
        }
    }

    /// Swap the rule table; runs already in progress keep their snapshot.
    pub fn replace_classifier(&self, classifier: IssueClassifier) {
        self.classifier.store(Arc::new(classifier));
    }

    pub fn gateway(&self) -> &Arc<TicketGateway> {
        &self.gateway
    }

    /// Pull one batch and process every record in it.
    pub async fn run_once(&self) -> Result<RunReport, SourceError> {
        let records = self.source.fetch(self.batch_size).await.map_err(|e| {
            tracing::error!(source = self.source.name(), error = %e, "Failed to read log source");
            e
        })?;
        let classifier = self.classifier.load_full();

        tracing::debug!(source = self.source.name(), records = records.len(), "Processing log batch");

        let outcomes: Vec<RecordOutcome> = stream::iter(records)
            .map(|record| {
                let classifier = Arc::clone(&classifier);
                async move { self.process(&classifier, &record).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = RunReport::from_outcomes(outcomes);
        tracing::info!(
            source = self.source.name(),
            scanned = report.scanned,
            ticketed = report.ticketed,
            deduplicated = report.deduplicated,
            failed = report.failed,
            "Pipeline run complete"
        );
        Ok(report)
    }

    async fn process(&self, classifier: &IssueClassifier, record: &LogRecord) -> RecordOutcome {
        let Some(issue) = detect(classifier, record) else {
            return RecordOutcome::Ignored;
        };

        tracing::warn!(
            category = %issue.category,
            trace_id = %record.trace_id,
            service = %record.service_name,
            "Issue detected"
        );
        metrics::record_issue(&issue.category);

        let dedupe_key = DedupeKey::for_record(&issue.category, issue.source_record);
        match self
            .gateway
            .create(&issue.category, issue.description, dedupe_key.clone())
            .await
        {
            Ok(outcome) => RecordOutcome::Ticketed {
                category: issue.category,
                dedupe_key,
                outcome,
            },
            Err(error) => RecordOutcome::TicketFailed {
                category: issue.category,
                dedupe_key,
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::IssueRule;
    use crate::config::TicketConfig;
    use crate::correlation::CorrelationContext;
    use crate::logging::LogLevel;
    use crate::tickets::client::mock::MockIncidentApi;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Source returning a fixed batch, or an error.
    struct StaticSource {
        records: Mutex<Result<Vec<LogRecord>, ()>>,
    }

    impl StaticSource {
        fn new(records: Vec<LogRecord>) -> Self {
            Self { records: Mutex::new(Ok(records)) }
        }

        fn broken() -> Self {
            Self { records: Mutex::new(Err(())) }
        }
    }

    #[async_trait]
    impl LogSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, limit: usize) -> Result<Vec<LogRecord>, SourceError> {
            match &*self.records.lock().unwrap() {
                Ok(records) => Ok(records.iter().take(limit).cloned().collect()),
                Err(()) => Err(SourceError::Unavailable {
                    path: "static".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
                }),
            }
        }
    }

    fn record(trace: &str, level: LogLevel, message: &str, fields: &[(&str, &str)]) -> LogRecord {
        let ctx = CorrelationContext::from_parts(Some(trace), Some("alex"));
        fields.iter().fold(
            LogRecord::new("payment", &ctx, "/charge", level, message),
            |r, (k, v)| r.with_field(*k, *v),
        )
    }

    fn validation(trace: &str, error_type: &str, order_id: &str) -> LogRecord {
        record(
            trace,
            LogLevel::Warn,
            "payment rejected",
            &[("event", "payment_validation"), ("error_type", error_type), ("order_id", order_id)],
        )
    }

    fn pipeline(source: StaticSource, api: Arc<MockIncidentApi>, concurrency: usize) -> Pipeline {
        let gateway = Arc::new(TicketGateway::new(api, &TicketConfig::default()));
        let config = PipelineConfig {
            batch_size: 100,
            concurrency,
            interval_secs: 60,
        };
        Pipeline::new(Arc::new(source), IssueClassifier::default(), gateway, &config)
    }

    #[test]
    fn test_description_layout() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(
            describe(ts, "Fraud Blocked", "error_type=FraudBlocked"),
            "Timestamp: 2024-05-01T10:00:00+00:00\nDetected Issue: Fraud Blocked\nLog Message:\nerror_type=FraudBlocked\n"
        );
    }

    #[test]
    fn test_detect_uses_structured_fields() {
        let r = validation("t-1", "InvalidAmount", "o-1");
        let issue = detect(&IssueClassifier::default(), &r).unwrap();
        assert_eq!(issue.category, "Invalid Amount");
        assert!(issue.description.contains("order_id=o-1"));

        let plain = record("t-2", LogLevel::Info, "request completed", &[("event", "http_request")]);
        assert!(detect(&IssueClassifier::default(), &plain).is_none());
    }

    #[tokio::test]
    async fn test_run_classifies_and_tickets() {
        let api = Arc::new(MockIncidentApi::default());
        let records = vec![
            record("t-0", LogLevel::Info, "request completed", &[]),
            validation("t-1", "InvalidAmount", "o-1"),
            validation("t-2", "FraudBlocked", "o-2"),
            record("t-3", LogLevel::Error, "charge failed", &[("event", "payment_failure"), ("error_type", "RandomFail")]),
        ];
        let pipeline = pipeline(StaticSource::new(records), api.clone(), 2);

        let report = pipeline.run_once().await.unwrap();
        assert_eq!(report.scanned, 4);
        assert_eq!(report.ignored, 1);
        assert_eq!(report.ticketed, 3);
        assert_eq!(api.calls(), 3);

        assert_eq!(report.outcomes[0], RecordOutcome::Ignored);
        match &report.outcomes[3] {
            RecordOutcome::Ticketed { category, dedupe_key, .. } => {
                assert_eq!(category, "Random Failure");
                // No order id: falls back to the trace id.
                assert_eq!(*dedupe_key, DedupeKey::new("Random Failure", "t-3"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rerun_over_same_window_creates_no_new_tickets() {
        let api = Arc::new(MockIncidentApi::default());
        let records = vec![
            validation("t-1", "DuplicateTransaction", "o-1DUP"),
            validation("t-9", "DuplicateTransaction", "o-1DUP"),
        ];
        let pipeline = pipeline(StaticSource::new(records), api.clone(), 4);

        let first = pipeline.run_once().await.unwrap();
        assert_eq!(first.ticketed, 1);
        assert_eq!(first.deduplicated, 1);

        let second = pipeline.run_once().await.unwrap();
        assert_eq!(second.ticketed, 0);
        assert_eq!(second.deduplicated, 2);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_ticket_failure_does_not_stop_the_batch() {
        let api = Arc::new(MockIncidentApi::default());
        api.fail_next(CreateTicketError::Rejected { status: 500, body: "down".into() });
        let records = vec![
            validation("t-1", "InvalidAmount", "o-1"),
            validation("t-2", "InvalidAmount", "o-2"),
        ];
        let pipeline = pipeline(StaticSource::new(records), api.clone(), 1);

        let report = pipeline.run_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.ticketed, 1);
        assert!(matches!(report.outcomes[0], RecordOutcome::TicketFailed { .. }));

        // The failed record is retried on the next run.
        let rerun = pipeline.run_once().await.unwrap();
        assert_eq!(rerun.ticketed, 1);
        assert_eq!(rerun.deduplicated, 1);
    }

    #[tokio::test]
    async fn test_runs_spawned_from_shared_pipeline() {
        let api = Arc::new(MockIncidentApi::default());
        let records = vec![
            validation("t-1", "InvalidAmount", "o-1"),
            validation("t-2", "FraudBlocked", "o-2"),
        ];
        let pipeline = Arc::new(pipeline(StaticSource::new(records), api.clone(), 2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move { pipeline.run_once().await })
            })
            .collect();

        let mut ticketed = 0;
        let mut deduplicated = 0;
        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            ticketed += report.ticketed;
            deduplicated += report.deduplicated;
        }
        assert_eq!(ticketed, 2);
        assert_eq!(deduplicated, 2);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_source_failure_aborts_run() {
        let api = Arc::new(MockIncidentApi::default());
        let pipeline = pipeline(StaticSource::broken(), api.clone(), 1);

        assert!(matches!(pipeline.run_once().await, Err(SourceError::Unavailable { .. })));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_classifier_swap_applies_to_next_run() {
        let api = Arc::new(MockIncidentApi::default());
        let records = vec![record("t-1", LogLevel::Error, "upstream connection timed out", &[])];
        let pipeline = pipeline(StaticSource::new(records), api.clone(), 1);

        assert_eq!(pipeline.run_once().await.unwrap().ignored, 1);

        pipeline.replace_classifier(IssueClassifier::new(vec![IssueRule::new(
            "Timeout Error",
            ["timed out"],
        )]));
        assert_eq!(pipeline.run_once().await.unwrap().ticketed, 1);
    }
}
