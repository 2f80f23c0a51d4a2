// src/main.rs
//! Chromepool service entry point
//!
//! Brings up the browser pool, then serves the gateway until interrupted.
//! On shutdown every spawned browser process is terminated via the pool's
//! process registry so no worker outlives the service.

use anyhow::Result;
use chromepool::browser::chromium::ChromiumFactory;
use chromepool::gateway::server::GatewayServer;
use chromepool::observability::{init_metrics, init_tracing};
use chromepool::pool::scheduler::BrowserPool;
use chromepool::utils::config::PoolConfig;
use std::net::SocketAddr;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = PoolConfig::from_env();
    init_metrics(config.metrics_port)?;

    info!(
        version = chromepool::VERSION,
        pool_size = config.pool_size,
        port = config.port,
        "starting chromepool"
    );

    let factory = ChromiumFactory::new(&config);
    let pool = BrowserPool::new(factory, config.clone());
    pool.start().await?;

    let gateway = GatewayServer::new(pool.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tokio::select! {
        result = gateway.serve(addr) => {
            if let Err(e) = result {
                error!(error = %e, "gateway stopped unexpectedly");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    pool.stop().await;
    info!("chromepool stopped");
    Ok(())
}
