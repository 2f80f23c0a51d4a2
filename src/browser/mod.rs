// src/browser/mod.rs
//! Browser launching and control
//!
//! This module owns everything that talks to the browser process itself:
//!
//! - **factory**: the launcher contract (`BrowserFactory` / `BrowserHandle`)
//!   consumed by the pool
//! - **chromium**: the concrete Chromium launcher (subprocess spawn,
//!   DevTools endpoint discovery, target event bridging)
//! - **cdp**: a minimal DevTools-protocol client used for housekeeping and
//!   render tasks
//!
//! The pool never assumes Chromium specifically; it schedules any
//! `BrowserFactory` implementation. Tests drive the pool with an in-memory
//! factory.

pub mod cdp;
pub mod chromium;
pub mod factory;

#[cfg(test)]
pub mod mock;

pub use cdp::CdpClient;
pub use chromium::{ChromiumBrowser, ChromiumFactory};
pub use factory::{BrowserEvent, BrowserFactory, BrowserHandle, TargetInfo, TargetKind};
