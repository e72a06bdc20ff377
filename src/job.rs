//! Per-job state: triggers, callback, single-shot timer, and the
//! paused/running flags.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::instant::{self, Instant};
use crate::trigger::AnyTrigger;

/// The context handed to a job's callback on each fire: read-only, set by
/// the scheduler before invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext<K> {
    pub scheduled_fire_time: Instant,
    pub actual_fire_time: Instant,
    pub data: K,
}

/// Boxed error type returned by user callbacks.
pub type CallbackError = Box<dyn StdError + Send + Sync>;

/// An error carrying exactly one nested cause, as may be produced by
/// callback adapters that wrap a single inner failure. [`unwrap_single_inner`]
/// collapses this back to the inner error before it reaches a
/// [`crate::scheduler::JobException`] subscriber.
#[derive(Debug)]
pub struct AggregateError(pub Vec<CallbackError>);

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} aggregated error(s)", self.0.len())
    }
}

impl StdError for AggregateError {}

/// If `err` is an [`AggregateError`] wrapping exactly one cause, return that
/// cause; otherwise return `err` unchanged.
pub fn unwrap_single_inner(err: CallbackError) -> CallbackError {
    match err.downcast::<AggregateError>() {
        Ok(mut aggregate) if aggregate.0.len() == 1 => aggregate.0.pop().unwrap(),
        Ok(aggregate) => aggregate,
        Err(original) => original,
    }
}

type SyncFn<K> = dyn Fn(ExecutionContext<K>) -> std::result::Result<(), CallbackError> + Send + Sync;
type AsyncFn<K> = dyn Fn(ExecutionContext<K>) -> Pin<Box<dyn Future<Output = std::result::Result<(), CallbackError>> + Send>>
    + Send
    + Sync;

/// The two callback shapes a job may be registered with.
pub enum Callback<K> {
    Sync(Box<SyncFn<K>>),
    Async(Box<AsyncFn<K>>),
}

/// Which slot a job's single-shot timer occupies.
enum TimerSlot {
    /// Not currently counting down.
    Disarmed,
    /// Counting down to a fire; aborting the handle cancels it.
    Armed(JoinHandle<()>),
    /// The job has been disposed; no further arming is possible.
    Disposed,
}

/// Per-job state owned by the scheduler's registry.
pub struct JobRegistration<K> {
    pub data: K,
    callback: Callback<K>,
    triggers: AsyncMutex<Vec<AnyTrigger>>,
    timer: AsyncMutex<TimerSlot>,
    paused: AtomicBool,
    running: AtomicBool,
    scheduled_fire_time: StdMutex<Instant>,
    actual_fire_time: StdMutex<Option<Instant>>,
}

impl<K> JobRegistration<K> {
    pub fn new(data: K, callback: Callback<K>, triggers: Vec<AnyTrigger>) -> Self {
        Self {
            data,
            callback,
            triggers: AsyncMutex::new(triggers),
            timer: AsyncMutex::new(TimerSlot::Disarmed),
            paused: AtomicBool::new(false),
            running: AtomicBool::new(false),
            scheduled_fire_time: StdMutex::new(instant::max_instant()),
            actual_fire_time: StdMutex::new(None),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, value: bool) {
        self.paused.store(value, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, value: bool) {
        self.running.store(value, Ordering::SeqCst);
    }

    pub fn scheduled_fire_time(&self) -> Instant {
        *self.scheduled_fire_time.lock().unwrap()
    }

    pub(crate) fn set_scheduled_fire_time(&self, when: Instant) {
        *self.scheduled_fire_time.lock().unwrap() = when;
    }

    pub fn actual_fire_time(&self) -> Option<Instant> {
        *self.actual_fire_time.lock().unwrap()
    }

    pub(crate) fn set_actual_fire_time(&self, when: Instant) {
        *self.actual_fire_time.lock().unwrap() = Some(when);
    }

    pub async fn triggers_snapshot(&self) -> Vec<String> {
        self.triggers
            .lock()
            .await
            .iter()
            .map(crate::trigger::Trigger::expression)
            .collect()
    }

    pub(crate) async fn with_triggers<R>(&self, f: impl FnOnce(&mut Vec<AnyTrigger>) -> R) -> R {
        let mut guard = self.triggers.lock().await;
        f(&mut guard)
    }

    /// Disarm the timer, aborting any pending fire. A no-op once disposed.
    pub(crate) async fn disarm(&self) {
        let mut slot = self.timer.lock().await;
        if let TimerSlot::Armed(handle) = &*slot {
            handle.abort();
        }
        if !matches!(*slot, TimerSlot::Disposed) {
            *slot = TimerSlot::Disarmed;
        }
    }

    /// Arm the timer to invoke `on_fire` after `due`. A no-op once disposed.
    pub(crate) async fn arm(&self, due: std::time::Duration, on_fire: impl Future<Output = ()> + Send + 'static) {
        let mut slot = self.timer.lock().await;
        if matches!(*slot, TimerSlot::Disposed) {
            trace!("arm called on disposed job, ignoring");
            return;
        }
        if let TimerSlot::Armed(handle) = &*slot {
            handle.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(due).await;
            on_fire.await;
        });
        *slot = TimerSlot::Armed(handle);
    }

    /// Dispose the timer permanently: aborts any pending fire and makes all
    /// future `arm`/`disarm` calls no-ops.
    pub(crate) async fn dispose(&self) {
        let mut slot = self.timer.lock().await;
        if let TimerSlot::Armed(handle) = &*slot {
            handle.abort();
        }
        *slot = TimerSlot::Disposed;
    }

    pub(crate) async fn is_disposed(&self) -> bool {
        matches!(*self.timer.lock().await, TimerSlot::Disposed)
    }

    /// Invoke the user callback. The sync variant runs inline on the
    /// calling (timer-dispatch) task; the async variant is awaited to
    /// completion. Either way this always returns -- a failed callback
    /// yields `Err`, with any single-inner-cause aggregate already unwrapped
    /// -- so the caller can unconditionally proceed to its own
    /// "on_complete" step (clearing `running`, re-arming) regardless of
    /// outcome.
    pub async fn execute_callback(&self, ctx: ExecutionContext<K>) -> std::result::Result<(), CallbackError> {
        let result = match &self.callback {
            Callback::Sync(f) => f(ctx),
            Callback::Async(f) => f(ctx).await,
        };
        result.map_err(unwrap_single_inner)
    }
}
