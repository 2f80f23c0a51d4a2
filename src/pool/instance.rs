// src/pool/instance.rs
//! Browser instance lifecycle
//!
//! Wraps one browser process and owns its state machine:
//!
//! ```text
//! Launching ──launch──▶ Idle ──start_job──▶ Busy
//!                        ▲                    │
//!                        │   top-level target destroyed, under limit
//!                        └────────────────────┤
//!                                             │  at limit ──▶ Disposed
//!     any state ──disconnect / reset failure──┴─────────────▶ Disposed
//! ```
//!
//! The instance has no visibility into the work a client performs over the
//! forwarded connection. It infers "the job is over" by tracking the first
//! page target created while Busy as the job's top-level context; when the
//! browser reports that target destroyed, the job is closed. A dropped
//! transport connection does not close a job; clients may keep the socket
//! open after their work concludes.
//!
//! Every transition emits exactly one [`InstanceEvent`], consumed by the
//! pool for recycling decisions. Timer and event-pump tasks are scoped to
//! the instance and torn down on `kill`.

use crate::browser::factory::{BrowserEvent, BrowserFactory, BrowserHandle, TargetInfo, TargetKind};
use crate::pool::job::Job;
use crate::utils::errors::{PoolError, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Business state of one pooled browser instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Launching,
    Idle,
    Busy,
    Disposed,
}

/// Lifecycle notifications emitted towards the pool.
#[derive(Debug, Clone)]
pub enum InstanceEvent {
    Launched { instance_id: u64, pid: u32 },
    JobStarted { instance_id: u64, job: Job },
    JobEnded {
        instance_id: u64,
        job: Job,
        final_url: Option<String>,
    },
    JobTimeout { instance_id: u64, job: Job },
    JobLimitExceeded { instance_id: u64 },
    Death { instance_id: u64 },
}

pub struct BrowserInstance<H: BrowserHandle> {
    id: u64,
    jobs_limit: u64,
    jobs_timeout: Duration,
    events: mpsc::UnboundedSender<InstanceEvent>,
    weak: Weak<Self>,
    inner: Mutex<Inner<H>>,
}

impl<H: BrowserHandle> std::fmt::Debug for BrowserInstance<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserInstance")
            .field("id", &self.id)
            .field("jobs_limit", &self.jobs_limit)
            .field("jobs_timeout", &self.jobs_timeout)
            .finish_non_exhaustive()
    }
}

struct Inner<H> {
    state: InstanceState,
    handle: Option<Arc<H>>,
    control_endpoint: Option<String>,
    pid: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    jobs_completed: u64,
    current_job: Option<Job>,
    job_timed_out: bool,
    tracked_target: Option<String>,
    last_url: Option<String>,
    deadline: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl<H: BrowserHandle> BrowserInstance<H> {
    pub fn new(
        id: u64,
        jobs_limit: u64,
        jobs_timeout: Duration,
        events: mpsc::UnboundedSender<InstanceEvent>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id,
            jobs_limit,
            jobs_timeout,
            events,
            weak: weak.clone(),
            inner: Mutex::new(Inner {
                state: InstanceState::Launching,
                handle: None,
                control_endpoint: None,
                pid: None,
                started_at: None,
                jobs_completed: 0,
                current_job: None,
                job_timed_out: false,
                tracked_target: None,
                last_url: None,
                deadline: None,
                pump: None,
            }),
        })
    }

    /// Launch the browser process via the factory and go Idle.
    pub async fn launch<F>(&self, factory: &F) -> Result<()>
    where
        F: BrowserFactory<Handle = H>,
    {
        let mut handle = factory.create_instance().await?;
        let events_rx = handle.take_events().ok_or_else(|| {
            PoolError::LaunchFailed("browser handle yielded no event stream".into())
        })?;
        let pid = handle.pid();
        let endpoint = handle.control_endpoint().to_string();

        let pump = self
            .weak
            .upgrade()
            .map(|me| tokio::spawn(Self::pump_events(me, events_rx)));
        {
            let mut inner = self.inner.lock();
            inner.state = InstanceState::Idle;
            inner.handle = Some(Arc::new(handle));
            inner.control_endpoint = Some(endpoint.clone());
            inner.pid = Some(pid);
            inner.started_at = Some(Utc::now());
            inner.jobs_completed = 0;
            inner.pump = pump;
        }

        info!(instance_id = self.id, pid, endpoint = %endpoint, "browser instance started");
        counter!("chromepool_instances_launched_total").increment(1);
        self.emit(InstanceEvent::Launched {
            instance_id: self.id,
            pid,
        });
        Ok(())
    }

    /// Begin a job. The instance must be Idle with no active job; anything
    /// else is a scheduling bug and fails immediately.
    pub fn start_job(&self, job_id: u64) -> Result<Job> {
        let job = Job::new(job_id);
        {
            let mut inner = self.inner.lock();
            if let Some(active) = inner.current_job {
                return Err(PoolError::JobAlreadyActive {
                    instance_id: self.id,
                    active_job: active.id(),
                });
            }
            if inner.state != InstanceState::Idle {
                return Err(PoolError::InstanceDisposed(self.id));
            }
            inner.state = InstanceState::Busy;
            inner.jobs_completed += 1;
            inner.current_job = Some(job);
            inner.job_timed_out = false;
            inner.tracked_target = None;
            inner.last_url = None;
            inner.deadline = self
                .weak
                .upgrade()
                .map(|me| tokio::spawn(Self::enforce_deadline(me, job)));
        }

        debug!(instance_id = self.id, job_id, "job started");
        counter!("chromepool_jobs_started_total").increment(1);
        self.emit(InstanceEvent::JobStarted {
            instance_id: self.id,
            job,
        });
        Ok(job)
    }

    /// Explicitly close the active job. Used by callers that drive a scripted
    /// task and have no browser-side end signal to rely on. No-op when no
    /// job is active.
    pub fn finish_job(&self) {
        self.end_job();
    }

    /// Between-jobs housekeeping without a relaunch. A failed reset means
    /// the browser is in an unknown state; the instance is then declared
    /// dead rather than reused.
    pub async fn clear(&self) -> Result<()> {
        let handle = {
            let inner = self.inner.lock();
            if inner.state == InstanceState::Disposed {
                return Ok(());
            }
            inner.handle.clone()
        };
        let Some(handle) = handle else {
            return Ok(());
        };

        trace!(instance_id = self.id, "clearing browser state");
        match handle.reset().await {
            Ok(()) => {
                {
                    let mut inner = self.inner.lock();
                    if inner.state == InstanceState::Disposed {
                        return Ok(());
                    }
                    if let Some(deadline) = inner.deadline.take() {
                        deadline.abort();
                    }
                    inner.current_job = None;
                    inner.job_timed_out = false;
                    inner.tracked_target = None;
                    inner.last_url = None;
                    inner.state = InstanceState::Idle;
                }
                counter!("chromepool_instance_clears_total").increment(1);
                Ok(())
            }
            Err(e) => {
                warn!(
                    instance_id = self.id,
                    error = %e,
                    "browser reset failed, treating instance as dead"
                );
                self.on_death();
                Err(e)
            }
        }
    }

    /// Tear the instance down: stop the timer and event pump, drop the
    /// control channel, force-terminate the process. Idempotent.
    pub async fn kill(&self) {
        let (handle, pump, deadline) = {
            let mut inner = self.inner.lock();
            inner.state = InstanceState::Disposed;
            inner.control_endpoint = None;
            inner.current_job = None;
            (
                inner.handle.take(),
                inner.pump.take(),
                inner.deadline.take(),
            )
        };
        if let Some(deadline) = deadline {
            deadline.abort();
        }
        if let Some(pump) = pump {
            pump.abort();
        }
        if let Some(handle) = handle {
            debug!(instance_id = self.id, "killing browser instance");
            handle.terminate().await;
        }
    }

    async fn enforce_deadline(instance: Arc<Self>, job: Job) {
        tokio::time::sleep(instance.jobs_timeout).await;
        instance.on_deadline(job);
    }

    fn on_deadline(&self, job: Job) {
        let fired = {
            let mut inner = self.inner.lock();
            if inner.state == InstanceState::Busy
                && inner.current_job.map(|j| j.id()) == Some(job.id())
                && !inner.job_timed_out
            {
                inner.deadline = None;
                // The stale job stays assigned until the pool clears the
                // instance for reuse.
                inner.job_timed_out = true;
                true
            } else {
                false
            }
        };
        if fired {
            warn!(
                instance_id = self.id,
                job_id = job.id(),
                timeout_ms = self.jobs_timeout.as_millis() as u64,
                "job deadline elapsed"
            );
            counter!("chromepool_job_timeouts_total").increment(1);
            self.emit(InstanceEvent::JobTimeout {
                instance_id: self.id,
                job,
            });
        }
    }

    fn end_job(&self) {
        enum Outcome {
            Ended(Job, Option<String>),
            LimitReached(Job),
            Ignored,
        }

        let outcome = {
            let mut inner = self.inner.lock();
            if inner.state != InstanceState::Busy || inner.job_timed_out {
                Outcome::Ignored
            } else if let Some(job) = inner.current_job.take() {
                if let Some(deadline) = inner.deadline.take() {
                    deadline.abort();
                }
                inner.tracked_target = None;
                let final_url = inner.last_url.take();
                if inner.jobs_completed >= self.jobs_limit {
                    inner.state = InstanceState::Disposed;
                    Outcome::LimitReached(job)
                } else {
                    inner.state = InstanceState::Idle;
                    Outcome::Ended(job, final_url)
                }
            } else {
                Outcome::Ignored
            }
        };

        match outcome {
            Outcome::Ended(job, final_url) => {
                info!(
                    instance_id = self.id,
                    job_id = job.id(),
                    final_url = final_url.as_deref().unwrap_or(""),
                    "job ended"
                );
                counter!("chromepool_jobs_ended_total").increment(1);
                self.emit(InstanceEvent::JobEnded {
                    instance_id: self.id,
                    job,
                    final_url,
                });
            }
            Outcome::LimitReached(job) => {
                info!(
                    instance_id = self.id,
                    job_id = job.id(),
                    jobs_limit = self.jobs_limit,
                    "job ended, retirement limit reached"
                );
                counter!("chromepool_jobs_ended_total").increment(1);
                self.emit(InstanceEvent::JobLimitExceeded {
                    instance_id: self.id,
                });
            }
            Outcome::Ignored => {}
        }
    }

    fn on_death(&self) {
        let died = {
            let mut inner = self.inner.lock();
            if inner.state == InstanceState::Disposed {
                false
            } else {
                if let Some(deadline) = inner.deadline.take() {
                    deadline.abort();
                }
                inner.current_job = None;
                inner.job_timed_out = false;
                inner.state = InstanceState::Disposed;
                true
            }
        };
        if died {
            warn!(instance_id = self.id, "browser instance died");
            counter!("chromepool_instance_deaths_total").increment(1);
            self.emit(InstanceEvent::Death {
                instance_id: self.id,
            });
        }
    }

    async fn pump_events(
        instance: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<BrowserEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                BrowserEvent::TargetCreated(target) => instance.on_target_created(target),
                BrowserEvent::TargetChanged(target) => instance.on_target_changed(target),
                BrowserEvent::TargetDestroyed { target_id } => {
                    instance.on_target_destroyed(&target_id)
                }
                BrowserEvent::Disconnected => {
                    instance.on_death();
                    return;
                }
            }
        }
        // Event stream ended without an explicit disconnect; same meaning.
        instance.on_death();
    }

    fn on_target_created(&self, target: TargetInfo) {
        trace!(
            instance_id = self.id,
            target_id = %target.target_id,
            kind = ?target.kind,
            url = %target.url,
            "target created"
        );
        let mut inner = self.inner.lock();
        if inner.state == InstanceState::Busy
            && !inner.job_timed_out
            && inner.tracked_target.is_none()
            && target.kind == TargetKind::Page
        {
            debug!(
                instance_id = self.id,
                target_id = %target.target_id,
                "tracking top-level context for active job"
            );
            inner.tracked_target = Some(target.target_id);
            inner.last_url = Some(target.url);
        }
    }

    fn on_target_changed(&self, target: TargetInfo) {
        let mut inner = self.inner.lock();
        if inner.tracked_target.as_deref() == Some(target.target_id.as_str()) {
            trace!(instance_id = self.id, url = %target.url, "navigation");
            inner.last_url = Some(target.url);
        }
    }

    fn on_target_destroyed(&self, target_id: &str) {
        let ends_job = {
            let inner = self.inner.lock();
            inner.tracked_target.as_deref() == Some(target_id)
        };
        if ends_job {
            self.end_job();
        }
    }

    fn emit(&self, event: InstanceEvent) {
        // The pool may already be gone during shutdown.
        let _ = self.events.send(event);
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn jobs_limit(&self) -> u64 {
        self.jobs_limit
    }

    pub fn jobs_timeout(&self) -> Duration {
        self.jobs_timeout
    }

    pub fn state(&self) -> InstanceState {
        self.inner.lock().state
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == InstanceState::Disposed
    }

    pub fn control_endpoint(&self) -> Option<String> {
        self.inner.lock().control_endpoint.clone()
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.lock().pid
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().started_at
    }

    pub fn jobs_completed(&self) -> u64 {
        self.inner.lock().jobs_completed
    }

    pub fn current_job(&self) -> Option<Job> {
        self.inner.lock().current_job
    }

    pub fn job_limit_exceeded(&self) -> bool {
        self.jobs_completed() >= self.jobs_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::MockFactory;
    use tokio::time::timeout;

    const EVENT_WAIT: Duration = Duration::from_secs(2);

    async fn launched_instance(
        id: u64,
        jobs_limit: u64,
        jobs_timeout: Duration,
    ) -> (
        Arc<BrowserInstance<crate::browser::mock::MockBrowser>>,
        mpsc::UnboundedReceiver<InstanceEvent>,
        MockFactory,
    ) {
        let factory = MockFactory::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let instance = BrowserInstance::new(id, jobs_limit, jobs_timeout, tx);
        instance.launch(&factory).await.unwrap();
        (instance, rx, factory)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<InstanceEvent>) -> InstanceEvent {
        timeout(EVENT_WAIT, rx.recv())
            .await
            .expect("timed out waiting for instance event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_launch_goes_idle_and_emits_launched() {
        let (instance, mut rx, _factory) =
            launched_instance(1, 31, Duration::from_secs(30)).await;
        assert_eq!(instance.state(), InstanceState::Idle);
        assert_eq!(instance.jobs_completed(), 0);
        assert!(instance.control_endpoint().is_some());
        assert!(matches!(
            next_event(&mut rx).await,
            InstanceEvent::Launched { instance_id: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_job_limit_reached_only_at_limit() {
        // limit 4: below the limit the instance keeps recycling
        let (instance, _rx, _factory) = launched_instance(1, 4, Duration::from_secs(30)).await;

        for job_id in 1..=3u64 {
            instance.start_job(job_id).unwrap();
            assert!(!instance.job_limit_exceeded());
            instance.finish_job();
            assert_eq!(instance.state(), InstanceState::Idle);
        }

        instance.start_job(4).unwrap();
        assert!(instance.job_limit_exceeded());
        instance.finish_job();
        assert_eq!(instance.state(), InstanceState::Disposed);
    }

    #[tokio::test]
    async fn test_limit_reached_emits_limit_event_not_job_ended() {
        let (instance, mut rx, _factory) = launched_instance(2, 1, Duration::from_secs(30)).await;
        assert!(matches!(
            next_event(&mut rx).await,
            InstanceEvent::Launched { .. }
        ));

        instance.start_job(1).unwrap();
        assert!(matches!(
            next_event(&mut rx).await,
            InstanceEvent::JobStarted { .. }
        ));
        instance.finish_job();
        assert!(matches!(
            next_event(&mut rx).await,
            InstanceEvent::JobLimitExceeded { instance_id: 2 }
        ));
    }

    #[tokio::test]
    async fn test_second_start_fails_and_leaves_job_untouched() {
        let (instance, _rx, _factory) = launched_instance(3, 33, Duration::from_secs(30)).await;

        instance.start_job(10).unwrap();
        let err = instance.start_job(11).unwrap_err();
        assert!(err
            .to_string()
            .contains("cannot start a new job until the previous has finished"));
        assert_eq!(instance.current_job().map(|j| j.id()), Some(10));
        assert_eq!(instance.jobs_completed(), 1);
    }

    #[tokio::test]
    async fn test_start_on_disposed_fails() {
        let (instance, _rx, _factory) = launched_instance(4, 34, Duration::from_secs(30)).await;
        instance.kill().await;
        let err = instance.start_job(1).unwrap_err();
        assert!(matches!(err, PoolError::InstanceDisposed(4)));
    }

    #[tokio::test]
    async fn test_tracked_target_destruction_ends_job_with_final_url() {
        let (instance, mut rx, factory) = launched_instance(5, 35, Duration::from_secs(30)).await;
        let control = factory.latest_control().unwrap();
        instance.start_job(1).unwrap();

        control
            .events
            .send(BrowserEvent::TargetCreated(TargetInfo {
                target_id: "T1".into(),
                kind: TargetKind::Page,
                url: "about:blank".into(),
            }))
            .unwrap();
        control
            .events
            .send(BrowserEvent::TargetChanged(TargetInfo {
                target_id: "T1".into(),
                kind: TargetKind::Page,
                url: "https://example.com/done".into(),
            }))
            .unwrap();
        control
            .events
            .send(BrowserEvent::TargetDestroyed {
                target_id: "T1".into(),
            })
            .unwrap();

        loop {
            match next_event(&mut rx).await {
                InstanceEvent::JobEnded { job, final_url, .. } => {
                    assert_eq!(job.id(), 1);
                    assert_eq!(final_url.as_deref(), Some("https://example.com/done"));
                    break;
                }
                InstanceEvent::Launched { .. } | InstanceEvent::JobStarted { .. } => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(instance.state(), InstanceState::Idle);
    }

    #[tokio::test]
    async fn test_unrelated_target_destruction_does_not_end_job() {
        let (instance, _rx, factory) = launched_instance(6, 36, Duration::from_secs(30)).await;
        let control = factory.latest_control().unwrap();
        instance.start_job(1).unwrap();

        control
            .events
            .send(BrowserEvent::TargetCreated(TargetInfo {
                target_id: "T1".into(),
                kind: TargetKind::Page,
                url: "about:blank".into(),
            }))
            .unwrap();
        // A stray devtools page or another context closing must not end the job.
        control
            .events
            .send(BrowserEvent::TargetDestroyed {
                target_id: "OTHER".into(),
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(instance.state(), InstanceState::Busy);
        assert!(instance.current_job().is_some());
    }

    #[tokio::test]
    async fn test_deadline_fires_and_instance_keeps_stale_job() {
        let (instance, mut rx, _factory) = launched_instance(7, 37, Duration::from_millis(40)).await;
        instance.start_job(9).unwrap();

        loop {
            match next_event(&mut rx).await {
                InstanceEvent::JobTimeout { job, .. } => {
                    assert_eq!(job.id(), 9);
                    break;
                }
                InstanceEvent::Launched { .. } | InstanceEvent::JobStarted { .. } => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        // Still assigned to the stale job until the pool clears it.
        assert_eq!(instance.state(), InstanceState::Busy);
        assert_eq!(instance.current_job().map(|j| j.id()), Some(9));

        instance.clear().await.unwrap();
        assert_eq!(instance.state(), InstanceState::Idle);
        assert!(instance.current_job().is_none());
    }

    #[tokio::test]
    async fn test_timed_out_job_cannot_also_end_normally() {
        let (instance, mut rx, factory) = launched_instance(8, 38, Duration::from_millis(40)).await;
        let control = factory.latest_control().unwrap();
        instance.start_job(1).unwrap();
        control
            .events
            .send(BrowserEvent::TargetCreated(TargetInfo {
                target_id: "T1".into(),
                kind: TargetKind::Page,
                url: "about:blank".into(),
            }))
            .unwrap();

        // Wait for the deadline, then report the target destroyed.
        tokio::time::sleep(Duration::from_millis(80)).await;
        control
            .events
            .send(BrowserEvent::TargetDestroyed {
                target_id: "T1".into(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut timeouts = 0;
        let mut ends = 0;
        while let Ok(Some(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
            match event {
                InstanceEvent::JobTimeout { .. } => timeouts += 1,
                InstanceEvent::JobEnded { .. } => ends += 1,
                _ => {}
            }
        }
        assert_eq!(timeouts, 1);
        assert_eq!(ends, 0);
    }

    #[tokio::test]
    async fn test_disconnect_means_death() {
        let (instance, mut rx, factory) = launched_instance(9, 39, Duration::from_secs(30)).await;
        let control = factory.latest_control().unwrap();
        instance.start_job(1).unwrap();

        control.events.send(BrowserEvent::Disconnected).unwrap();

        loop {
            match next_event(&mut rx).await {
                InstanceEvent::Death { instance_id } => {
                    assert_eq!(instance_id, 9);
                    break;
                }
                InstanceEvent::Launched { .. } | InstanceEvent::JobStarted { .. } => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(instance.state(), InstanceState::Disposed);
        assert!(instance.current_job().is_none());
    }

    #[tokio::test]
    async fn test_clear_failure_is_death() {
        let (instance, mut rx, factory) = launched_instance(10, 40, Duration::from_secs(30)).await;
        let control = factory.latest_control().unwrap();
        control.reset_fail.store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(instance.clear().await.is_err());
        loop {
            match next_event(&mut rx).await {
                InstanceEvent::Death { .. } => break,
                InstanceEvent::Launched { .. } => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(instance.state(), InstanceState::Disposed);
    }

    #[tokio::test]
    async fn test_clear_preserves_identity_and_tuning() {
        let (instance, _rx, factory) = launched_instance(11, 41, Duration::from_secs(7)).await;
        instance.start_job(1).unwrap();
        instance.finish_job();

        instance.clear().await.unwrap();

        assert_eq!(instance.id(), 11);
        assert_eq!(instance.jobs_limit(), 41);
        assert_eq!(instance.jobs_timeout(), Duration::from_secs(7));
        // Wear survives housekeeping; only a relaunch resets it.
        assert_eq!(instance.jobs_completed(), 1);
        assert_eq!(
            factory
                .latest_control()
                .unwrap()
                .reset_calls
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn test_kill_is_idempotent_and_terminates_process() {
        let (instance, _rx, factory) = launched_instance(12, 42, Duration::from_secs(30)).await;
        let control = factory.latest_control().unwrap();

        instance.kill().await;
        instance.kill().await;

        assert!(control.terminated.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(instance.state(), InstanceState::Disposed);
        assert!(instance.control_endpoint().is_none());
    }
}
