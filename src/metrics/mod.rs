//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Polling and observation outcomes
//! - Action activation and status transitions
//! - Detail fetches and executions

use crate::error::{TrackerError, TrackerResult};
use crate::swap::{ActionKind, ActionStatus};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref SWAPS_TRACKED: Gauge = register_gauge!(
        "swap_tracker_swaps_tracked",
        "Number of swaps currently tracked"
    ).unwrap();

    pub static ref OBSERVATIONS: CounterVec = register_counter_vec!(
        "swap_tracker_observations_total",
        "Swap observations by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref POLL_ERRORS: CounterVec = register_counter_vec!(
        "swap_tracker_poll_errors_total",
        "Failed swap polls by error kind",
        &["kind"]
    ).unwrap();

    pub static ref ACTIONS_ACTIVATED: CounterVec = register_counter_vec!(
        "swap_tracker_actions_activated_total",
        "Newly offered actions by kind",
        &["kind"]
    ).unwrap();

    pub static ref STATUS_TRANSITIONS: CounterVec = register_counter_vec!(
        "swap_tracker_status_transitions_total",
        "Action status transitions by target status",
        &["status"]
    ).unwrap();

    pub static ref DETAIL_FETCHES: CounterVec = register_counter_vec!(
        "swap_tracker_detail_fetches_total",
        "Ledger action detail fetches by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref EXECUTIONS: CounterVec = register_counter_vec!(
        "swap_tracker_executions_total",
        "Unattended executions by outcome",
        &["outcome"]
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

    pub async fn run(&self) -> TrackerResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TrackerError::Internal(format!("bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| TrackerError::Internal(format!("metrics server: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_swaps_tracked(count: usize) {
    SWAPS_TRACKED.set(count as f64);
}

pub fn record_observation(outcome: &str) {
    OBSERVATIONS.with_label_values(&[outcome]).inc();
}

pub fn record_poll_error(error: &TrackerError) {
    POLL_ERRORS.with_label_values(&[error.kind()]).inc();
}

pub fn record_action_activated(kind: ActionKind) {
    ACTIONS_ACTIVATED.with_label_values(&[kind.as_str()]).inc();
}

pub fn record_status(status: ActionStatus) {
    STATUS_TRANSITIONS
        .with_label_values(&[&status.to_string()])
        .inc();
}

pub fn record_detail_fetch(success: bool) {
    DETAIL_FETCHES
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

pub fn record_execution(success: bool) {
    EXECUTIONS
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}
