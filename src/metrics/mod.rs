//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Chain lock acquisitions and wait times
//! - Pacing delays
//! - Pending waiters per chain
//! - Classified operation failures

use crate::error::AgentResult;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

lazy_static! {
    // Lock metrics
    pub static ref LOCK_ACQUIRED: CounterVec = register_counter_vec!(
        "swap_agent_chain_lock_acquired_total",
        "Total chain lock acquisitions",
        &["chain"]
    ).unwrap();

    pub static ref LOCK_WAIT: HistogramVec = register_histogram_vec!(
        "swap_agent_chain_lock_wait_seconds",
        "Time spent waiting for a chain lock to be released",
        &["chain"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    pub static ref PACING_DELAY: HistogramVec = register_histogram_vec!(
        "swap_agent_chain_pacing_delay_seconds",
        "Pacing delay applied after acquiring a chain lock",
        &["chain"],
        vec![0.5, 1.0, 2.0, 3.5, 5.0, 7.0]
    ).unwrap();

    pub static ref PENDING_WAITERS: GaugeVec = register_gauge_vec!(
        "swap_agent_chain_lock_pending",
        "Requests currently waiting for a chain lock",
        &["chain"]
    ).unwrap();

    pub static ref LOCK_ERRORS: CounterVec = register_counter_vec!(
        "swap_agent_chain_lock_errors_total",
        "Failed operations under a chain lock by classification",
        &["chain", "kind"]
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "swap_agent_health_check_success_total",
        "Total successful health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> AgentResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Encode all registered metrics in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// Helper functions to record metrics

pub fn record_lock_acquired(chain: &str) {
    LOCK_ACQUIRED.with_label_values(&[chain]).inc();
}

pub fn record_lock_wait(chain: &str, waited: Duration) {
    LOCK_WAIT
        .with_label_values(&[chain])
        .observe(waited.as_secs_f64());
}

pub fn record_pacing_delay(chain: &str, delay: Duration) {
    PACING_DELAY
        .with_label_values(&[chain])
        .observe(delay.as_secs_f64());
}

pub fn set_pending_waiters(chain: &str, pending: usize) {
    PENDING_WAITERS
        .with_label_values(&[chain])
        .set(pending as f64);
}

pub fn record_lock_error(chain: &str, kind: &str) {
    LOCK_ERRORS.with_label_values(&[chain, kind]).inc();
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}
