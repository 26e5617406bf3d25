//! herdwatchd — the herdwatch daemon.
//!
//! Single binary that assembles the subsystems:
//! - Marathon client (shared orchestrator connection)
//! - Poller (snapshot builds, broadcast to viewers)
//! - Scale controller (threshold + cooldown scale-ups)
//! - Viewer server (home page + WebSocket sessions)
//!
//! # Usage
//!
//! ```text
//! herdwatchd --marathon-url http://172.17.0.1:8080 --app cattlestore
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::info;

use herdwatch_autoscale::{ScaleController, ScalePolicy};
use herdwatch_marathon::MarathonClient;
use herdwatch_poll::{HttpMetricFetcher, Poller, SnapshotAggregator};
use herdwatch_server::{ServerState, build_router};

#[derive(Parser)]
#[command(name = "herdwatchd", about = "Herdwatch daemon")]
struct Cli {
    /// Port to serve the dashboard on.
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Base URL of the Marathon master.
    #[arg(long, default_value = "http://172.17.0.1:8080")]
    marathon_url: String,

    /// Application to watch and scale.
    #[arg(long, default_value = "cattlestore")]
    app: String,

    /// Snapshot push period in milliseconds.
    #[arg(long, default_value = "1000")]
    push_interval_ms: u64,

    /// Minimum seconds between two scale-up attempts.
    #[arg(long, default_value = "5")]
    scale_cooldown_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,herdwatchd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    info!(app = %cli.app, marathon = %cli.marathon_url, "herdwatch daemon starting");

    // The orchestrator client is the one process-fatal dependency.
    let orchestrator = Arc::new(MarathonClient::new(&cli.marathon_url)?);

    // ── Channels ───────────────────────────────────────────────
    let (snapshot_tx, _) = broadcast::channel(16);
    let (totals_tx, totals_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────

    let aggregator = SnapshotAggregator::new(
        orchestrator.clone(),
        Arc::new(HttpMetricFetcher::new()),
        cli.app.clone(),
    );
    let poller = Poller::new(
        aggregator,
        Duration::from_millis(cli.push_interval_ms),
        snapshot_tx.clone(),
        totals_tx,
    );
    let poller_shutdown = shutdown_rx.clone();
    let poller_handle = tokio::spawn(async move {
        poller.run(poller_shutdown).await;
    });

    let policy = ScalePolicy {
        cooldown: Duration::from_secs(cli.scale_cooldown_secs),
        ..ScalePolicy::default()
    };
    let controller = ScaleController::with_policy(orchestrator, cli.app, policy);
    let controller_shutdown = shutdown_rx.clone();
    let controller_handle = tokio::spawn(async move {
        controller.run(totals_rx, controller_shutdown).await;
    });

    // ── Viewer server ──────────────────────────────────────────

    let router = build_router(ServerState {
        snapshots: snapshot_tx,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    info!(%addr, "viewer server starting, ready to herd");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = poller_handle.await;
    let _ = controller_handle.await;

    info!("herdwatch daemon stopped");
    Ok(())
}
