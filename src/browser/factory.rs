// src/browser/factory.rs
//! Launcher contract consumed by the pool
//!
//! A factory produces a running browser process and hands back a
//! [`BrowserHandle`]: the control endpoint used to reach the browser, the
//! OS process id, and a stream of [`BrowserEvent`]s. The pool builds its
//! whole lifecycle on this contract and nothing else, so the concrete
//! launcher can be swapped (tests use an in-memory one).

use crate::utils::errors::Result;
use std::future::Future;
use tokio::sync::mpsc;

/// Classification of a browsing target reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Page,
    Browser,
    Other,
}

/// A browsing context/page inside the worker.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub target_id: String,
    pub kind: TargetKind,
    pub url: String,
}

/// Asynchronous notifications from a running browser process.
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    /// The process died or the control channel dropped.
    Disconnected,
    TargetCreated(TargetInfo),
    TargetChanged(TargetInfo),
    TargetDestroyed { target_id: String },
}

/// Handle to one running browser process.
///
/// The handle is exclusively owned by the instance wrapping it; `reset` and
/// `terminate` take `&self` so housekeeping can run while the instance
/// retains shared references for its timer and event-pump tasks.
pub trait BrowserHandle: Send + Sync + 'static {
    /// Control-channel endpoint (DevTools websocket URL).
    fn control_endpoint(&self) -> &str;

    /// OS process id of the browser.
    fn pid(&self) -> u32;

    /// Take the event stream. Yields `Some` exactly once.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<BrowserEvent>>;

    /// Between-jobs housekeeping: open a fresh blank page, close every other
    /// page, clear cache and cookies, dispose extra browsing contexts.
    fn reset(&self) -> impl Future<Output = Result<()>> + Send;

    /// Force-terminate the process and drop the control channel. No grace
    /// period; the worker is disposable. Idempotent.
    fn terminate(&self) -> impl Future<Output = ()> + Send;
}

/// Produces running browser processes.
pub trait BrowserFactory: Send + Sync + 'static {
    type Handle: BrowserHandle;

    fn create_instance(&self) -> impl Future<Output = Result<Self::Handle>> + Send;
}
