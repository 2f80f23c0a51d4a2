// src/pool/scheduler.rs
//! Pool scheduling and recycling
//!
//! Owns the set of browser instances, hands them out one job at a time, and
//! reacts to their lifecycle events: clean reusable instances go back on
//! the idle stack, worn-out or dead ones are killed and replaced with
//! freshly launched processes. A registry of live process ids guarantees
//! that every spawned browser is terminated on shutdown even if its
//! instance object was lost along the way.

use crate::browser::factory::{BrowserFactory, BrowserHandle};
use crate::pool::instance::{BrowserInstance, InstanceEvent};
use crate::utils::config::PoolConfig;
use crate::utils::errors::{PoolError, Result};
use crate::utils::ids::IdGenerator;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// How often a blocked `acquire` re-checks the idle stack. Callers suspend
/// rather than erroring; there is no waiter queue.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Pause between attempts to launch a replacement instance.
const RELAUNCH_BACKOFF: Duration = Duration::from_secs(1);

/// Pool of browser instances.
pub struct BrowserPool<F: BrowserFactory> {
    factory: F,
    weak: Weak<Self>,
    config: PoolConfig,
    instance_ids: IdGenerator,
    job_ids: IdGenerator,
    events_tx: mpsc::UnboundedSender<InstanceEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<InstanceEvent>>>,
    shared: Mutex<PoolShared<F::Handle>>,
    stopped: AtomicBool,
}

struct PoolShared<H: BrowserHandle> {
    /// Idle instances, most recently returned on top. Serving the warmest
    /// instance first is deliberate.
    idle: Vec<Arc<BrowserInstance<H>>>,
    /// Every live browser process id, for the shutdown kill-sweep.
    live_pids: HashSet<u32>,
    /// All live instances by id, for event routing.
    instances: HashMap<u64, Arc<BrowserInstance<H>>>,
    events_task: Option<JoinHandle<()>>,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub pool_size: usize,
    pub idle_instances: usize,
    pub live_instances: usize,
    pub live_processes: usize,
}

impl<F: BrowserFactory> BrowserPool<F> {
    pub fn new(factory: F, config: PoolConfig) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new_cyclic(|weak| Self {
            factory,
            weak: weak.clone(),
            config,
            instance_ids: IdGenerator::new(),
            job_ids: IdGenerator::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shared: Mutex::new(PoolShared {
                idle: Vec::new(),
                live_pids: HashSet::new(),
                instances: HashMap::new(),
                events_task: None,
            }),
            stopped: AtomicBool::new(false),
        })
    }

    /// Bring up the full pool. Returns once every instance is launched and
    /// idle; the gateway must not accept work before this completes.
    pub async fn start(&self) -> Result<()> {
        let events_rx = self
            .events_rx
            .lock()
            .take()
            .ok_or(PoolError::AlreadyStarted)?;
        let events_task = self
            .weak
            .upgrade()
            .map(|me| tokio::spawn(Self::run_events(me, events_rx)));
        self.shared.lock().events_task = events_task;

        info!(pool_size = self.config.pool_size, "starting browser pool");
        for _ in 0..self.config.pool_size {
            self.spawn_instance().await?;
        }
        info!(pool_size = self.config.pool_size, "browser pool ready");
        Ok(())
    }

    /// Take one idle instance and start a job on it. When the pool is
    /// drained the caller suspends, re-checking the stack every poll
    /// interval, until another job finishes. First woken takes it.
    pub async fn acquire(&self) -> Result<Arc<BrowserInstance<F::Handle>>> {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return Err(PoolError::PoolStopped);
            }
            let candidate = self.shared.lock().idle.pop();
            match candidate {
                Some(instance) if instance.is_disposed() => {
                    // Died while idle; its death event drives the
                    // replacement. Just keep looking.
                    trace!(instance_id = instance.id(), "discarding dead idle instance");
                }
                Some(instance) => {
                    self.note_idle_len();
                    let job_id = self.job_ids.next();
                    instance.start_job(job_id)?;
                    return Ok(instance);
                }
                None => tokio::time::sleep(ACQUIRE_POLL_INTERVAL).await,
            }
        }
    }

    /// Stop accepting acquisitions and terminate every live browser
    /// process. The process-id registry, not the instance objects, is the
    /// authority on what must die.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("stopping browser pool");

        let (instances, mut leftover_pids, events_task) = {
            let mut shared = self.shared.lock();
            let instances: Vec<_> = shared.instances.drain().map(|(_, i)| i).collect();
            shared.idle.clear();
            let pids = std::mem::take(&mut shared.live_pids);
            (instances, pids, shared.events_task.take())
        };
        if let Some(task) = events_task {
            task.abort();
        }

        for instance in instances {
            if let Some(pid) = instance.pid() {
                leftover_pids.remove(&pid);
            }
            instance.kill().await;
        }
        // Anything still registered belongs to an instance object we no
        // longer hold; kill it by pid.
        for pid in leftover_pids {
            kill_process(pid);
        }
        info!("browser pool stopped");
    }

    /// Point-in-time counters.
    pub fn stats(&self) -> PoolStats {
        let shared = self.shared.lock();
        PoolStats {
            pool_size: self.config.pool_size,
            idle_instances: shared.idle.len(),
            live_instances: shared.instances.len(),
            live_processes: shared.live_pids.len(),
        }
    }

    /// Launch one new instance and put it into service.
    async fn spawn_instance(&self) -> Result<()> {
        let id = self.instance_ids.next();
        // Staggered retirement: each instance's limit is offset by its id
        // so the pool never retires everything on the same job count.
        let jobs_limit = self.config.base_job_limit + id;
        let instance = BrowserInstance::new(
            id,
            jobs_limit,
            self.config.job_timeout,
            self.events_tx.clone(),
        );
        self.shared
            .lock()
            .instances
            .insert(id, Arc::clone(&instance));

        match instance.launch(&self.factory).await {
            Ok(()) => {
                {
                    let mut shared = self.shared.lock();
                    if let Some(pid) = instance.pid() {
                        shared.live_pids.insert(pid);
                    }
                    shared.idle.push(instance);
                }
                self.note_idle_len();
                Ok(())
            }
            Err(e) => {
                self.shared.lock().instances.remove(&id);
                Err(e)
            }
        }
    }

    async fn run_events(pool: Arc<Self>, mut events: mpsc::UnboundedReceiver<InstanceEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                InstanceEvent::Launched { instance_id, pid } => {
                    debug!(instance_id, pid, "instance entered service");
                }
                InstanceEvent::JobStarted { instance_id, job } => {
                    trace!(instance_id, job_id = job.id(), "instance busy");
                }
                InstanceEvent::JobEnded { instance_id, .. }
                | InstanceEvent::JobTimeout { instance_id, .. } => {
                    // Recycling runs detached so a slow browser reset never
                    // stalls event handling or other callers' polling.
                    tokio::spawn(Arc::clone(&pool).recycle(instance_id));
                }
                InstanceEvent::JobLimitExceeded { instance_id } => {
                    warn!(instance_id, "job limit exceeded, retiring instance");
                    counter!("chromepool_instances_retired_total").increment(1);
                    tokio::spawn(Arc::clone(&pool).retire(instance_id));
                }
                InstanceEvent::Death { instance_id } => {
                    counter!("chromepool_instances_replaced_total").increment(1);
                    tokio::spawn(Arc::clone(&pool).retire(instance_id));
                }
            }
        }
    }

    /// Clean an instance up in place and return it to the idle stack.
    async fn recycle(self: Arc<Self>, instance_id: u64) {
        let instance = self.shared.lock().instances.get(&instance_id).cloned();
        let Some(instance) = instance else {
            return;
        };
        // A failed clear emits a death event, which replaces the instance.
        if instance.clear().await.is_ok() {
            self.add_idle(instance);
        }
    }

    /// Remove an instance from service, kill it, and launch a replacement.
    async fn retire(self: Arc<Self>, instance_id: u64) {
        let instance = {
            let mut shared = self.shared.lock();
            shared.idle.retain(|i| i.id() != instance_id);
            let instance = shared.instances.remove(&instance_id);
            if let Some(instance) = &instance {
                if let Some(pid) = instance.pid() {
                    shared.live_pids.remove(&pid);
                }
            }
            instance
        };
        let Some(instance) = instance else {
            return;
        };
        debug!(instance_id, "retiring instance");
        instance.kill().await;
        self.note_idle_len();

        while !self.stopped.load(Ordering::SeqCst) {
            match self.spawn_instance().await {
                Ok(()) => return,
                Err(e) => {
                    error!(error = %e, "replacement launch failed, retrying");
                    tokio::time::sleep(RELAUNCH_BACKOFF).await;
                }
            }
        }
    }

    fn add_idle(&self, instance: Arc<BrowserInstance<F::Handle>>) {
        if self.stopped.load(Ordering::SeqCst) || instance.is_disposed() {
            return;
        }
        {
            let mut shared = self.shared.lock();
            if shared.idle.iter().any(|i| i.id() == instance.id()) {
                warn!(instance_id = instance.id(), "instance already idle");
                return;
            }
            shared.idle.push(instance);
        }
        self.note_idle_len();
    }

    fn note_idle_len(&self) {
        gauge!("chromepool_idle_instances").set(self.shared.lock().idle.len() as f64);
    }
}

fn kill_process(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "process already gone");
    }
}
