// src/pool/mod.rs
//! Browser instance pool
//!
//! This module owns the pooled-browser lifecycle:
//!
//! - **instance**: one browser process wrapped in an explicit state machine
//!   (Launching → Idle → Busy → Disposed) with job tracking and deadlines
//! - **scheduler**: the pool itself: idle stack, live-process registry,
//!   recycle/retire policy driven by instance events
//! - **job**: the per-acquisition correlation record
//!
//! # Architecture
//!
//! ```text
//!                  ┌───────────────────────────────┐
//!  acquire() ◀─────│  BrowserPool                  │
//!  (LIFO, polls    │   idle:      [I4, I2, I1]     │
//!   every 200 ms)  │   live pids: {801, 802, ...}  │
//!                  │   instances: id → instance    │
//!                  └──────────────┬────────────────┘
//!                                 │ InstanceEvent
//!          ┌──────────────────────┴───────────────────────┐
//!          │ job_ended / job_timeout   → clear, re-add    │
//!          │ job_limit_exceeded / death → kill, replace   │
//!          └──────────────────────────────────────────────┘
//! ```
//!
//! Acquisition favors the most recently returned instance (warm caches)
//! over even utilization, and waiting callers are not queued: whoever polls
//! first after a release wins. Both properties are deliberate.

pub mod instance;
pub mod job;
pub mod scheduler;

pub use instance::{BrowserInstance, InstanceEvent, InstanceState};
pub use job::Job;
pub use scheduler::{BrowserPool, PoolStats};
