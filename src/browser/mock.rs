// src/browser/mock.rs
//! In-memory browser factory for tests
//!
//! Mirrors the launcher contract without any subprocess: fake pids, an
//! injectable event stream per handle, and switches for making launches or
//! resets fail.

use crate::browser::factory::{BrowserEvent, BrowserFactory, BrowserHandle};
use crate::utils::errors::{PoolError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// Above any real pid_max so a stray signal can never reach a live process.
const FIRST_FAKE_PID: u32 = 10_000_000;

/// Test-side control for one created handle.
#[derive(Clone)]
pub struct MockControl {
    pub pid: u32,
    pub events: mpsc::UnboundedSender<BrowserEvent>,
    pub reset_fail: Arc<AtomicBool>,
    pub reset_calls: Arc<AtomicUsize>,
    pub terminated: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct MockFactory {
    created: AtomicU32,
    fail_next_launch: AtomicBool,
    controls: Mutex<Vec<MockControl>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_launch(&self) {
        self.fail_next_launch.store(true, Ordering::SeqCst);
    }

    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn control(&self, pid: u32) -> Option<MockControl> {
        self.controls.lock().iter().find(|c| c.pid == pid).cloned()
    }

    pub fn latest_control(&self) -> Option<MockControl> {
        self.controls.lock().last().cloned()
    }

    pub fn controls(&self) -> Vec<MockControl> {
        self.controls.lock().clone()
    }
}

impl BrowserFactory for MockFactory {
    type Handle = MockBrowser;

    async fn create_instance(&self) -> Result<MockBrowser> {
        if self.fail_next_launch.swap(false, Ordering::SeqCst) {
            return Err(PoolError::LaunchFailed("mock launch failure".into()));
        }
        let pid = FIRST_FAKE_PID + self.created.fetch_add(1, Ordering::SeqCst);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let control = MockControl {
            pid,
            events: events_tx,
            reset_fail: Arc::new(AtomicBool::new(false)),
            reset_calls: Arc::new(AtomicUsize::new(0)),
            terminated: Arc::new(AtomicBool::new(false)),
        };
        self.controls.lock().push(control.clone());
        Ok(MockBrowser {
            endpoint: format!("ws://127.0.0.1:9222/devtools/browser/mock-{pid}"),
            pid,
            events: Some(events_rx),
            reset_fail: control.reset_fail,
            reset_calls: control.reset_calls,
            terminated: control.terminated,
        })
    }
}

pub struct MockBrowser {
    endpoint: String,
    pid: u32,
    events: Option<mpsc::UnboundedReceiver<BrowserEvent>>,
    reset_fail: Arc<AtomicBool>,
    reset_calls: Arc<AtomicUsize>,
    terminated: Arc<AtomicBool>,
}

impl BrowserHandle for MockBrowser {
    fn control_endpoint(&self) -> &str {
        &self.endpoint
    }

    fn pid(&self) -> u32 {
        self.pid
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<BrowserEvent>> {
        self.events.take()
    }

    async fn reset(&self) -> Result<()> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        if self.reset_fail.load(Ordering::SeqCst) {
            Err(PoolError::ControlChannel("mock reset failure".into()))
        } else {
            Ok(())
        }
    }

    async fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}
