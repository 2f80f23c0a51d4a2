// src/utils/config.rs
//! Environment-driven service configuration
//!
//! Every tunable is a numeric environment override with a default that is
//! used when the variable is absent or does not parse. An operator typo in
//! `POOL_SIZE` degrades to the default rather than refusing to boot.

use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Default number of pooled browser instances.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default base job count before an instance is retired. The effective
/// per-instance limit is `base + instance id`, so instances retire on a
/// staggered schedule instead of all at once.
pub const DEFAULT_JOB_LIMIT: u64 = 30;

/// Default job deadline in seconds.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 30;

/// Default gateway listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default Prometheus exporter port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of browser instances kept alive (`POOL_SIZE`).
    pub pool_size: usize,

    /// Base job count before retirement (`JOB_LIMIT`).
    pub base_job_limit: u64,

    /// Per-job deadline (`JOB_TIMEOUT`, seconds; millisecond resolution
    /// internally).
    pub job_timeout: Duration,

    /// Gateway listen port (`PORT`).
    pub port: u16,

    /// Prometheus exporter port (`METRICS_PORT`).
    pub metrics_port: u16,

    /// Explicit browser executable (`CHROME_PATH`); discovered on `PATH`
    /// when unset.
    pub chrome_path: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            base_job_limit: DEFAULT_JOB_LIMIT,
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            chrome_path: None,
        }
    }
}

impl PoolConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            pool_size: numeric_env("POOL_SIZE", DEFAULT_POOL_SIZE),
            base_job_limit: numeric_env("JOB_LIMIT", DEFAULT_JOB_LIMIT),
            job_timeout: Duration::from_secs(numeric_env(
                "JOB_TIMEOUT",
                DEFAULT_JOB_TIMEOUT_SECS,
            )),
            port: numeric_env("PORT", DEFAULT_PORT),
            metrics_port: numeric_env("METRICS_PORT", DEFAULT_METRICS_PORT),
            chrome_path: std::env::var("CHROME_PATH").ok().filter(|p| !p.is_empty()),
        }
    }
}

/// Parse a numeric environment variable, falling back to `default` when the
/// variable is absent or invalid.
fn numeric_env<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or_default(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or_default<T: FromStr + Copy>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, raw, "ignoring unparsable environment override");
            default
        }
    }
}
