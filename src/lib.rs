// src/lib.rs
//! Chromepool
//!
//! A pool of disposable headless Chromium instances behind a
//! connection-forwarding gateway. Clients connect to one endpoint; the pool
//! hands each connection exclusive use of a pre-warmed browser for the
//! duration of its job, then recycles the browser in place or retires and
//! replaces it.
//!
//! # Architecture
//!
//! The crate is structured into a few key modules:
//!
//! - **pool**: the instance lifecycle state machine and the scheduler that
//!   owns the idle stack, process registry, and recycle policy
//! - **browser**: the launcher contract, the concrete Chromium launcher,
//!   and the DevTools control-channel client
//! - **gateway**: the HTTP front end (upgrade tunnel, PDF render endpoint,
//!   status)
//! - **observability**: tracing and metrics initialization
//! - **utils**: errors, configuration, id generation

pub mod browser;
pub mod gateway;
pub mod observability;
pub mod pool;
pub mod utils;

// Re-export commonly used types
pub use browser::chromium::ChromiumFactory;
pub use browser::factory::{BrowserEvent, BrowserFactory, BrowserHandle};
pub use gateway::server::GatewayServer;
pub use pool::instance::{BrowserInstance, InstanceEvent, InstanceState};
pub use pool::scheduler::{BrowserPool, PoolStats};
pub use utils::config::PoolConfig;
pub use utils::errors::{PoolError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
