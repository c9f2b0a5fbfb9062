//! Drive correlated end-to-end flows across the four demo services.
//!
//! Each simulated user logs in, then places orders whose charges hit every
//! payment outcome: a normal charge, an invalid amount, a duplicate order id and
//! a fraud-sized amount. All calls for one user share the trace id issued at
//! login.

use clap::Parser;
use serde_json::{json, Value};
use std::time::Duration;

use tracewatch::config::ObservabilityConfig;
use tracewatch::correlation::{CorrelationContext, ServiceClient};
use tracewatch::observability;

#[derive(Parser)]
#[command(name = "traffic-sim")]
#[command(about = "Generate correlated traffic across the demo services", long_about = None)]
struct Cli {
    #[arg(long, default_value = "http://localhost:8001")]
    auth: String,

    #[arg(long, default_value = "http://localhost:8002")]
    order: String,

    #[arg(long, default_value = "http://localhost:8003")]
    payment: String,

    #[arg(long, default_value = "http://localhost:8004")]
    notify: String,

    /// Users to simulate
    #[arg(long, value_delimiter = ',', default_value = "michel,alex,robert,sneha,james")]
    users: Vec<String>,

    /// Pause between users in milliseconds
    #[arg(long, default_value_t = 1000)]
    pause_ms: u64,

    /// Print the last N log lines of every service at the end
    #[arg(long, default_value_t = 0)]
    show_logs: usize,
}

struct Services {
    auth: ServiceClient,
    order: ServiceClient,
    payment: ServiceClient,
    notify: ServiceClient,
}

/// One order/charge scenario.
struct Scenario {
    name: &'static str,
    amount: f64,
    order_suffix: &'static str,
}

const SCENARIOS: [Scenario; 4] = [
    Scenario { name: "normal", amount: 150.0, order_suffix: "" },
    Scenario { name: "invalid-amount", amount: 0.0, order_suffix: "" },
    Scenario { name: "duplicate", amount: 150.0, order_suffix: "DUP" },
    Scenario { name: "fraud", amount: 60000.0, order_suffix: "" },
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    observability::logging::init(&ObservabilityConfig::default());

    let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
    let services = Services {
        auth: ServiceClient::new(client.clone(), &cli.auth),
        order: ServiceClient::new(client.clone(), &cli.order),
        payment: ServiceClient::new(client.clone(), &cli.payment),
        notify: ServiceClient::new(client, &cli.notify),
    };

    for user in &cli.users {
        if let Err(e) = run_user_flow(&services, user).await {
            eprintln!("flow for {user} failed: {e}");
        }
        tokio::time::sleep(Duration::from_millis(cli.pause_ms)).await;
    }

    if cli.show_logs > 0 {
        for service in [&services.auth, &services.order, &services.payment, &services.notify] {
            print_logs(service, cli.show_logs).await;
        }
    }

    Ok(())
}

async fn run_user_flow(services: &Services, user: &str) -> Result<(), reqwest::Error> {
    println!("\n====== FLOW FOR USER: {user} ======");

    let root = CorrelationContext::root(None);
    let login = services
        .auth
        .post_json(&root, "/login", &json!({ "username": user, "password": "x" }))
        .await?;
    let ctx = ServiceClient::continue_from(&root, &login);
    println!("trace={} user={}", ctx.trace_id(), ctx.user_id());

    for scenario in &SCENARIOS {
        let order_id = format!("o-{}{}", short_id(), scenario.order_suffix);

        services
            .order
            .post_json(
                &ctx,
                "/create",
                &json!({ "id": order_id, "customer_id": ctx.user_id(), "amount": scenario.amount }),
            )
            .await?;

        let charge: Value = services
            .payment
            .post_json(
                &ctx,
                "/charge",
                &json!({ "id": format!("p-{}", short_id()), "order_id": order_id, "amount": scenario.amount }),
            )
            .await?
            .json()
            .await?;
        println!("{:<16} order={:<14} -> {}", scenario.name, order_id, charge);

        if charge["status"] == "ok" {
            services
                .notify
                .post_json(
                    &ctx,
                    "/send",
                    &json!({ "to": ctx.user_id(), "message": format!("order {order_id} done") }),
                )
                .await?;
        }
    }
    Ok(())
}

async fn print_logs(service: &ServiceClient, lines: usize) {
    println!("\n--- {} ---", service.base_url());
    match fetch_logs(service, lines).await {
        Ok(body) => {
            for line in body["logs"].as_array().into_iter().flatten() {
                println!("{}", line.as_str().unwrap_or_default());
            }
        }
        Err(e) => eprintln!("failed to fetch logs: {e}"),
    }
}

async fn fetch_logs(service: &ServiceClient, lines: usize) -> Result<Value, reqwest::Error> {
    let ctx = CorrelationContext::root(None);
    service
        .get(&ctx, &format!("/logs?lines={lines}"))
        .await?
        .json()
        .await
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}
