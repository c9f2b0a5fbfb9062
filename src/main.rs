//! tracewatch service host.
//!
//! Runs one of the demo services behind the correlation middleware.
//!
//! ```text
//!     client ──x-trace-id / x-user-id──▶ ┌──────────────────────────┐
//!                                        │ TraceLayer               │
//!                                        │ correlation middleware ──┼──▶ app.log (JSON lines)
//!                                        │ body limit / timeout     │
//!                                        │ auth|order|payment|notify│
//!     client ◀──────x-trace-id────────── └──────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use tracewatch::lifecycle::{signals, startup, Shutdown};
use tracewatch::observability;
use tracewatch::services::ServiceKind;
use tracewatch::ServiceServer;

#[derive(Parser, Debug)]
#[command(name = "tracewatch", version, about = "Correlated demo service host")]
struct Args {
    /// TOML config file; defaults are used when omitted
    #[arg(short, long, env = "TRACEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Service to run (overrides `service.name`)
    #[arg(short, long, value_enum)]
    service: Option<ServiceKind>,

    /// Bind address (overrides `service.bind_address`)
    #[arg(short, long)]
    bind: Option<String>,

    /// Structured log file (overrides `service.log_path`)
    #[arg(long)]
    log_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = startup::load(args.config.as_deref())?;
    observability::logging::init(&config.observability);

    let kind = match args.service {
        Some(kind) => kind,
        None => ServiceKind::from_name(&config.service.name)
            .ok_or_else(|| format!("unknown service '{}'", config.service.name))?,
    };
    config.service.name = kind.name().to_string();
    if let Some(bind) = args.bind {
        config.service.bind_address = bind;
    }
    if let Some(log_path) = args.log_path {
        config.service.log_path = log_path;
    }

    tracing::info!(
        service = %kind,
        bind_address = %config.service.bind_address,
        log_path = %config.service.log_path,
        request_timeout_secs = config.timeouts.request_secs,
        "tracewatch v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let logger = startup::open_sink(&config)?;
    let listener = TcpListener::bind(&config.service.bind_address).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_shutdown(shutdown.clone()));

    ServiceServer::new(kind, &config, logger)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
