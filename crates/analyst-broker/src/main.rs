//! Analyst Broker Server

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use analyst_broker::{http, sweeper, AppState, Config};

/// Task broker between analysis clients and versioned workers.
#[derive(Parser, Debug)]
#[command(name = "analyst-broker", about = "Long-polling task broker for analysis workers")]
struct Args {
    /// HTTP server address
    #[arg(long, default_value = "0.0.0.0:9001")]
    http_addr: String,

    /// Seconds a worker poll stays parked before answering empty
    #[arg(long, default_value = "30")]
    poll_timeout_secs: u64,

    /// Seconds a single-point requester waits for its result
    #[arg(long, default_value = "60")]
    priority_timeout_secs: u64,

    /// Seconds a regional task may go unacknowledged before redelivery
    #[arg(long, default_value = "60")]
    lease_secs: u64,

    /// Most regional tasks handed out per poll
    #[arg(long, default_value = "1")]
    max_batch_size: usize,

    /// Most regional tasks queued per category
    #[arg(long, default_value = "100000")]
    max_queue_depth: usize,

    /// Seconds between lease sweeps
    #[arg(long, default_value = "5")]
    sweep_interval_secs: u64,

    /// Seconds an idle worker stays in the worker list
    #[arg(long, default_value = "300")]
    worker_ttl_secs: u64,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            http_bind_addr: args.http_addr,
            poll_timeout_secs: args.poll_timeout_secs,
            priority_timeout_secs: args.priority_timeout_secs,
            lease_secs: args.lease_secs,
            max_batch_size: args.max_batch_size,
            max_queue_depth: args.max_queue_depth,
            sweep_interval_secs: args.sweep_interval_secs,
            worker_ttl_secs: args.worker_ttl_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("analyst_broker=info".parse()?),
        )
        .with_target(true)
        .init();

    let config = Config::from(Args::parse());
    let http_addr: SocketAddr = config.http_bind_addr.parse()?;

    info!(
        http_addr = %http_addr,
        poll_timeout_secs = config.poll_timeout_secs,
        lease_secs = config.lease_secs,
        max_batch_size = config.max_batch_size,
        "Starting analyst broker"
    );
    if config.worker_ttl().is_none() {
        warn!(
            worker_ttl_secs = config.worker_ttl_secs,
            "Worker TTL is out of range; idle workers will never be purged"
        );
    }

    let state = AppState::new(config);
    let sweeper = sweeper::spawn_sweeper(state.clone());
    let router = http::create_router(state);

    let listener = TcpListener::bind(http_addr).await?;
    info!("HTTP server listening on {}", http_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown requested");
        })
        .await?;

    sweeper.abort();
    info!("Analyst broker stopped");
    Ok(())
}
