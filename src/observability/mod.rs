// src/observability/mod.rs
//! Tracing and metrics initialization
//!
//! Structured logging via `tracing` with an env-filter (`RUST_LOG`), and a
//! Prometheus exporter for the `chromepool_*` counters and gauges emitted
//! around the pool lifecycle.

use crate::utils::errors::{PoolError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins; default `info`.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| PoolError::Init(e.to_string()))
}

/// Install the Prometheus exporter. Must run inside the tokio runtime.
pub fn init_metrics(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| PoolError::Init(e.to_string()))
}
