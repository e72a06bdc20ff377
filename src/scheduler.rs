//! The job registry and scheduling engine.
//!
//! [`Scheduler`] owns a map of jobs keyed by user-supplied data, arms and
//! re-arms each job's single-shot timer against the earliest upcoming
//! occurrence across its triggers, and dispatches callbacks asynchronously.
//! The `JobException` observer mirrors `openintent_kernel::ipc::IpcBus`:
//! broadcast to zero-or-more subscribers, with "no subscribers" treated as a
//! routine condition rather than an error.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{JobError, Result, SchedulerError};
use crate::instant::{self, Instant};
use crate::job::{Callback, ExecutionContext, JobRegistration};
use crate::job_info::JobInfo;
use crate::trigger::{AnyTrigger, Trigger};

/// Construction options for a [`Scheduler`].
pub struct SchedulerConfig {
    /// The time source used for occurrence generation and timer arming.
    pub clock: Arc<dyn Clock>,
    /// Capacity of the `JobException` broadcast channel. Subscribers that
    /// fall behind by more than this many exceptions will observe a
    /// `RecvError::Lagged`.
    pub job_exception_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            job_exception_capacity: 256,
        }
    }
}

/// Delivered to `JobException` subscribers when a job's callback returns an
/// error. The job itself is never removed or paused because of this.
#[derive(Debug, Clone)]
pub struct JobException<K> {
    pub data: K,
    pub scheduled_fire_time: Instant,
    pub actual_fire_time: Instant,
    pub error: JobError,
}

struct SchedulerInner<K> {
    jobs: StdMutex<HashMap<K, Arc<JobRegistration<K>>>>,
    running: AtomicBool,
    disposed: AtomicBool,
    clock: Arc<dyn Clock>,
    error_tx: broadcast::Sender<JobException<K>>,
}

/// The job registry and scheduling engine.
///
/// Cheaply cloneable (`Arc`-backed); clones share the same registry and can
/// be handed to spawned tasks freely.
pub struct Scheduler<K> {
    inner: Arc<SchedulerInner<K>>,
}

impl<K> Clone for Scheduler<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Scheduler<K> {
    /// Construct a scheduler using the system clock and default config.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Construct a scheduler with an injectable clock and channel capacity.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let (error_tx, _) = broadcast::channel(config.job_exception_capacity);
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: StdMutex::new(HashMap::new()),
                running: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                clock: config.clock,
                error_tx,
            }),
        }
    }

    /// Whether the scheduler is currently started.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Subscribe to callback errors. Subscribing after a `JobException` was
    /// published does not replay it.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<JobException<K>> {
        self.inner.error_tx.subscribe()
    }

    /// Register a job with a synchronous callback.
    pub fn schedule_job<F>(&self, data: K, callback: F, triggers: Vec<AnyTrigger>) -> Result<()>
    where
        F: Fn(ExecutionContext<K>) -> std::result::Result<(), crate::job::CallbackError> + Send + Sync + 'static,
    {
        self.insert_job(data, Callback::Sync(Box::new(callback)), triggers)
    }

    /// Register a job with an asynchronous callback.
    pub fn schedule_async_job<F, Fut>(&self, data: K, callback: F, triggers: Vec<AnyTrigger>) -> Result<()>
    where
        F: Fn(ExecutionContext<K>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<(), crate::job::CallbackError>> + Send + 'static,
    {
        self.insert_job(data, Callback::Async(Box::new(move |ctx| Box::pin(callback(ctx)))), triggers)
    }

    fn insert_job(&self, data: K, callback: Callback<K>, triggers: Vec<AnyTrigger>) -> Result<()> {
        self.ensure_not_disposed()?;
        let registration = Arc::new(JobRegistration::new(data.clone(), callback, triggers));
        {
            let mut jobs = self.inner.jobs.lock().unwrap();
            if jobs.contains_key(&data) {
                return Err(SchedulerError::DuplicateKey);
            }
            jobs.insert(data.clone(), registration);
        }
        info!("job scheduled");
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.refresh_job(&data).await;
        });
        Ok(())
    }

    /// Remove a job and dispose its timer.
    pub fn unschedule_job(&self, data: &K) -> Result<()> {
        self.ensure_not_disposed()?;
        let job = {
            let mut jobs = self.inner.jobs.lock().unwrap();
            jobs.remove(data).ok_or(SchedulerError::NotFound)?
        };
        let job_for_dispose = Arc::clone(&job);
        tokio::spawn(async move {
            job_for_dispose.dispose().await;
        });
        info!("job unscheduled");
        Ok(())
    }

    /// A read-only façade for one registered job.
    pub fn job_info(&self, data: &K) -> Result<JobInfo<K>> {
        self.ensure_not_disposed()?;
        let job = {
            let jobs = self.inner.jobs.lock().unwrap();
            jobs.get(data).cloned().ok_or(SchedulerError::NotFound)?
        };
        Ok(JobInfo {
            scheduler: self.clone(),
            key: data.clone(),
            job,
        })
    }

    /// A snapshot of every registered job.
    pub fn all_jobs(&self) -> Vec<JobInfo<K>> {
        let jobs = self.inner.jobs.lock().unwrap();
        jobs.iter()
            .map(|(key, job)| JobInfo {
                scheduler: self.clone(),
                key: key.clone(),
                job: Arc::clone(job),
            })
            .collect()
    }

    /// A snapshot of jobs whose callback is currently executing.
    pub fn running_jobs(&self) -> Vec<JobInfo<K>> {
        self.all_jobs().into_iter().filter(|j| j.is_running()).collect()
    }

    /// Start the scheduler: arms every registered job's timer against its
    /// earliest upcoming occurrence. Idempotent.
    pub fn start(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("start called while already running, ignoring");
            return Ok(());
        }
        info!("scheduler started");
        let keys: Vec<K> = self.inner.jobs.lock().unwrap().keys().cloned().collect();
        let scheduler = self.clone();
        tokio::spawn(async move {
            for key in keys {
                scheduler.refresh_job(&key).await;
            }
        });
        Ok(())
    }

    /// Stop the scheduler: disarms every job's timer without removing it or
    /// waiting for in-flight callbacks. Every timer is disarmed before this
    /// returns, so a `stop()` immediately followed by `start()` cannot race
    /// the disarm against the re-arm. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            warn!("stop called while not running, ignoring");
            return Ok(());
        }
        let jobs: Vec<Arc<JobRegistration<K>>> = self.inner.jobs.lock().unwrap().values().cloned().collect();
        for job in jobs {
            job.disarm().await;
        }
        info!("scheduler stopped");
        Ok(())
    }

    /// Stop the scheduler, dispose every job's timer, and clear the
    /// registry. All other operations fail with [`SchedulerError::ObjectDisposed`]
    /// afterward.
    pub async fn dispose(&self) -> Result<()> {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.running.store(false, Ordering::SeqCst);
        let jobs: Vec<Arc<JobRegistration<K>>> = {
            let mut jobs = self.inner.jobs.lock().unwrap();
            let values = jobs.values().cloned().collect();
            jobs.clear();
            values
        };
        for job in jobs {
            job.dispose().await;
        }
        info!("scheduler disposed");
        Ok(())
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Err(SchedulerError::ObjectDisposed);
        }
        Ok(())
    }

    fn get_job(&self, key: &K) -> Option<Arc<JobRegistration<K>>> {
        self.inner.jobs.lock().unwrap().get(key).cloned()
    }

    /// Recompute a job's earliest upcoming occurrence across its triggers
    /// and (re-)arm its timer. A no-op while the scheduler is not running.
    /// Exhausted triggers (those whose `upcoming` sequence is already
    /// empty) are dropped from the job's trigger list as a side effect.
    pub(crate) async fn refresh_job(&self, key: &K) {
        if !self.inner.running.load(Ordering::SeqCst) {
            trace!("refresh_job called while not running, ignoring");
            return;
        }
        let Some(job) = self.get_job(key) else {
            return;
        };

        let now = self.inner.clock.now();
        let next = job
            .with_triggers(|triggers| {
                let mut earliest: Option<Instant> = None;
                let mut i = 0;
                while i < triggers.len() {
                    let candidate = Trigger::upcoming(&triggers[i], now).next();
                    match candidate {
                        Some(candidate) => {
                            earliest = Some(match earliest {
                                Some(current) if current <= candidate => current,
                                _ => candidate,
                            });
                            i += 1;
                        }
                        None => {
                            triggers.remove(i);
                        }
                    }
                }
                earliest
            })
            .await
            .unwrap_or_else(instant::max_instant);

        job.set_scheduled_fire_time(next);

        if next == instant::max_instant() {
            debug!("job has no remaining triggers, not arming");
            return;
        }

        let due = instant::duration_until(next, self.inner.clock.now());
        let scheduler = self.clone();
        let key = key.clone();
        job.arm(due, async move {
            scheduler.on_tick(&key).await;
        })
        .await;
    }

    /// Timer-fire callback: dispatches the job's callback if the scheduler
    /// is running and the job is not paused, then re-arms.
    fn on_tick<'a>(&'a self, key: &'a K) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.on_tick_inner(key))
    }

    async fn on_tick_inner(&self, key: &K) {
        if !self.inner.running.load(Ordering::SeqCst) {
            return;
        }
        let Some(job) = self.get_job(key) else {
            return;
        };
        if job.is_paused() {
            trace!("tick observed a paused job, skipping");
            return;
        }

        let now = self.inner.clock.now();
        job.set_actual_fire_time(now);
        job.set_running(true);

        let ctx = ExecutionContext {
            scheduled_fire_time: job.scheduled_fire_time(),
            actual_fire_time: now,
            data: job.data.clone(),
        };
        let ctx_for_exception = ctx.clone();

        let result = job.execute_callback(ctx).await;
        job.set_running(false);

        if let Err(err) = result {
            let exception = JobException {
                data: ctx_for_exception.data,
                scheduled_fire_time: ctx_for_exception.scheduled_fire_time,
                actual_fire_time: ctx_for_exception.actual_fire_time,
                error: JobError::from(err),
            };
            if self.inner.error_tx.send(exception).is_err() {
                trace!("job exception published but no active subscribers");
            }
        }

        if self.inner.running.load(Ordering::SeqCst) {
            self.refresh_job(key).await;
        }
    }
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}
