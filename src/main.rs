//! Swap Agent - cross-chain swap execution agent
//!
//! Builds the shared chain scheduler, exposes metrics, and reports lock
//! state until shutdown.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

use swap_agent::config::{LogFormat, Settings};
use swap_agent::lock::{ChainScheduler, PacingPolicy};
use swap_agent::metrics::{self, MetricsServer};
use swap_agent::{ChainResolver, StaticAssetRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(settings.agent.log_format);

    info!(
        "Starting Swap Agent v{} ({})",
        env!("CARGO_PKG_VERSION"),
        settings.agent.instance_id
    );
    info!(
        "Loaded configuration for {} assets on {} chains",
        settings.assets.len(),
        settings.native_assets().len()
    );

    // Build the shared chain scheduler
    let registry = Arc::new(StaticAssetRegistry::from_settings(&settings)?);
    let pacing = PacingPolicy::from_config(&settings.chain_lock);
    info!(
        "Chain pacing gap: {}ms - {}ms",
        pacing.min_gap().as_millis(),
        pacing.max_gap().as_millis()
    );
    let scheduler = Arc::new(ChainScheduler::new(ChainResolver::new(registry), pacing));

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

    // Health check loop
    let health_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let interval = settings.agent.health_check_interval_secs;
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                for status in scheduler.snapshot() {
                    metrics::set_pending_waiters(status.chain.as_str(), status.pending);
                    if status.pending > 0 {
                        warn!(
                            "Chain {} has {} pending actions (held: {})",
                            status.chain, status.pending, status.held
                        );
                    } else {
                        debug!(
                            "Chain {} idle (held: {}, last release: {:?} ago)",
                            status.chain, status.held, status.last_release_age
                        );
                    }
                }

                metrics::record_health_check();
            }
        }
    });

    info!("Swap Agent is running");
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Swap Agent stopped");
    Ok(())
}

fn init_logging(format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_agent=debug,hyper=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
