// src/gateway/mod.rs
//! HTTP front end
//!
//! The gateway is a thin transport in front of the pool:
//!
//! - **server**: accept loop, routing, request validation, error mapping
//! - **proxy**: protocol-agnostic tunnel for upgraded connections, wired to
//!   an acquired instance's DevTools endpoint
//! - **render**: synchronous template-to-PDF endpoint driven directly
//!   against an acquired instance
//!
//! A forwarded connection's job ends when the instance observes its
//! top-level page go away, not when the tunnel closes. The render path has
//! no such browser-side signal, so it ends its job explicitly.

pub mod proxy;
pub mod render;
pub mod server;

pub use render::{PdfRenderer, RenderOptions, RenderRequest};
pub use server::GatewayServer;
