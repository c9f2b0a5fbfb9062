//! Periodic pipeline runs.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time;

use crate::classifier::IssueClassifier;
use crate::config::AppConfig;
use crate::pipeline::runner::Pipeline;

/// Runs the pipeline on a fixed interval. Runs never overlap.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Loop until `shutdown` fires. Reloaded configs replace the rule table.
    pub async fn run(
        self,
        mut shutdown: broadcast::Receiver<()>,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
    ) {
        tracing::info!(interval = ?self.interval, "Pipeline scheduler starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                Some(config) = config_updates.recv() => {
                    let classifier = IssueClassifier::from_config(&config.classifier);
                    tracing::info!(rules = classifier.rules().len(), "Classifier rules reloaded");
                    self.pipeline.replace_classifier(classifier);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Pipeline scheduler received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        let purged = self.pipeline.gateway().purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Expired dedupe keys purged");
        }

        // A failed read is already logged by the pipeline; the next tick retries.
        let _ = self.pipeline.run_once().await;
    }
}
