//! Scan service logs and file deduplicated incident tickets.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracewatch::classifier::IssueClassifier;
use tracewatch::config::watcher::ConfigWatcher;
use tracewatch::lifecycle::{signals, startup, Shutdown};
use tracewatch::observability;
use tracewatch::pipeline::{Pipeline, RecordOutcome, Scheduler};
use tracewatch::source;
use tracewatch::tickets::{RunLock, ServiceNowClient, StoreError, TicketGateway, TicketStore};
use tracewatch::AppConfig;

#[derive(Parser)]
#[command(name = "incident-scan")]
#[command(about = "Classify service logs and raise incident tickets", long_about = None)]
struct Cli {
    /// TOML config file; defaults are used when omitted
    #[arg(short, long, env = "TRACEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Read this log file instead of `source.file_path`
    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and print the report
    Once,
    /// Run every `pipeline.interval_secs` until interrupted
    Watch {
        /// Override the run interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = startup::load(cli.config.as_deref())?;
    observability::logging::init(&config.observability);
    if let Some(path) = cli.log_file {
        config.source.file_path = path;
    }

    // Held until exit; the gateway loads the store only once this is taken.
    let (store, _lock) = lock_store(&config).await?;
    let pipeline = Arc::new(build_pipeline(&config, store)?);

    match cli.command {
        Commands::Once => {
            let report = pipeline.run_once().await?;
            for outcome in &report.outcomes {
                match outcome {
                    RecordOutcome::Ignored => {}
                    RecordOutcome::Ticketed { category, outcome, .. } => println!(
                        "{:<24} {} {}",
                        category,
                        outcome.reference,
                        if outcome.deduplicated { "(existing)" } else { "(new)" }
                    ),
                    RecordOutcome::TicketFailed { category, error, .. } => {
                        println!("{:<24} FAILED {}", category, error)
                    }
                }
            }
            println!(
                "scanned={} ignored={} ticketed={} deduplicated={} failed={}",
                report.scanned, report.ignored, report.ticketed, report.deduplicated, report.failed
            );
        }
        Commands::Watch { interval } => {
            let interval = Duration::from_secs(interval.unwrap_or(config.pipeline.interval_secs).max(1));
            let shutdown = Shutdown::new();
            tokio::spawn(signals::wait_for_shutdown(shutdown.clone()));

            // The notify watcher stops when dropped; keep it for the whole run.
            let (updates, _watcher) = match cli.config.as_deref() {
                Some(path) => {
                    let (watcher, updates) = ConfigWatcher::new(path);
                    (updates, Some(watcher.run()?))
                }
                None => (tokio::sync::mpsc::unbounded_channel::<AppConfig>().1, None),
            };

            Scheduler::new(pipeline, interval)
                .run(shutdown.subscribe(), updates)
                .await;
        }
    }

    Ok(())
}

async fn lock_store(config: &AppConfig) -> Result<(Option<TicketStore>, Option<RunLock>), StoreError> {
    if config.tickets.state_path.is_empty() {
        tracing::warn!("tickets.state_path is empty; separate runs will not deduplicate against each other");
        return Ok((None, None));
    }
    let store = TicketStore::new(&config.tickets.state_path);
    let lock = store.lock(Duration::from_secs(config.tickets.lock_wait_secs)).await?;
    Ok((Some(store), Some(lock)))
}

fn build_pipeline(
    config: &AppConfig,
    store: Option<TicketStore>,
) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let outbound = Duration::from_secs(config.timeouts.outbound_secs);
    let client = reqwest::Client::builder().timeout(outbound).build()?;

    let api = Arc::new(ServiceNowClient::from_config(&config.tickets, client.clone(), outbound));
    let mut gateway = TicketGateway::new(api, &config.tickets).with_retries(&config.retries);
    if let Some(store) = store {
        gateway = gateway.with_store(store)?;
    }
    let gateway = Arc::new(gateway);
    let source = source::from_config(&config.source, client, outbound);

    tracing::info!(
        source = source.name(),
        endpoint = %config.tickets.endpoint,
        window_secs = config.tickets.dedupe_window_secs,
        "Incident pipeline configured"
    );

    Ok(Pipeline::new(
        source,
        IssueClassifier::from_config(&config.classifier),
        gateway,
        &config.pipeline,
    ))
}
