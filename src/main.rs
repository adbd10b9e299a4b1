//! Swap Tracker - client-side progress tracking for HERC20/HBIT atomic swaps
//!
//! Polls a comit network daemon for swap state, derives which protocol step
//! is active for the local party and drives each offered action through its
//! execution lifecycle.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod api;
mod cnd;
mod config;
mod error;
mod executor;
mod metrics;
mod swap;
mod tracker;

use cnd::CndClient;
use config::Settings;
use executor::{ActionExecutor, BitcoindExecutor};
use metrics::MetricsServer;
use tracker::SwapTracker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Swap Tracker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration, cnd at {} (auto execute: {})",
        settings.cnd.url, settings.tracker.auto_execute
    );

    let source = Arc::new(CndClient::new(&settings.cnd)?);

    let executor: Option<Arc<dyn ActionExecutor>> = match &settings.bitcoind {
        Some(bitcoind) if settings.tracker.auto_execute => {
            info!("Unattended broadcasts go through {}", bitcoind.endpoint);
            Some(Arc::new(BitcoindExecutor::new(bitcoind.clone())?))
        }
        _ => None,
    };

    let tracker = Arc::new(SwapTracker::new(
        source,
        executor,
        settings.tracker.clone(),
    ));

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let tracker = tracker.clone();
        async move {
            if let Err(e) = api::run_server(config, tracker).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start polling
    let tracker_handle = tokio::spawn({
        let tracker = tracker.clone();
        async move {
            if let Err(e) = tracker.run().await {
                error!("Swap tracker error: {}", e);
            }
        }
    });

    info!("Swap Tracker is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    tracker.stop().await;

    api_handle.abort();
    tracker_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Swap Tracker stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,swap_tracker=debug,hyper=warn,reqwest=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
