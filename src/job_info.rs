//! Read-only external view of a registered job, plus trigger/pause
//! mutation operations that refresh the job's next fire time.

use std::sync::Arc;

use crate::error::Result;
use crate::instant::{self, Instant};
use crate::job::JobRegistration;
use crate::scheduler::Scheduler;
use crate::trigger::AnyTrigger;

/// An external handle onto one registered job.
///
/// Read accessors are cheap snapshots; mutating methods (`pause`, `resume`,
/// and the `triggers` helpers) recompute and re-arm the job's timer.
pub struct JobInfo<K> {
    pub(crate) scheduler: Scheduler<K>,
    pub(crate) key: K,
    pub(crate) job: Arc<JobRegistration<K>>,
}

impl<K: Eq + std::hash::Hash + Clone + Send + Sync + 'static> JobInfo<K> {
    /// The job's identity key.
    pub fn data(&self) -> &K {
        &self.key
    }

    /// Whether the job is currently paused.
    pub fn is_paused(&self) -> bool {
        self.job.is_paused()
    }

    /// Whether the job's callback is currently executing.
    pub fn is_running(&self) -> bool {
        self.job.is_running()
    }

    /// The instant the callback last began executing, or `None` if it has
    /// never fired.
    pub fn actual_fire_time(&self) -> Option<Instant> {
        self.job.actual_fire_time()
    }

    /// The instant the scheduler last armed this job's timer for, or `None`
    /// if no trigger currently yields a future occurrence.
    pub fn scheduled_fire_time(&self) -> Option<Instant> {
        let when = self.job.scheduled_fire_time();
        if when == instant::max_instant() {
            None
        } else {
            Some(when)
        }
    }

    /// A snapshot of the job's current trigger expressions.
    pub async fn triggers(&self) -> Vec<String> {
        self.job.triggers_snapshot().await
    }

    /// Pause the job: disarms its timer. Firing resumes only after
    /// [`JobInfo::resume`] is called explicitly -- no backlog is replayed.
    pub async fn pause(&self) -> Result<()> {
        if self.job.is_disposed().await {
            return Err(crate::error::SchedulerError::ObjectDisposed);
        }
        self.job.set_paused(true);
        self.job.disarm().await;
        Ok(())
    }

    /// Resume a paused job and recompute its next fire time.
    pub async fn resume(&self) -> Result<()> {
        self.job.set_paused(false);
        self.scheduler.refresh_job(&self.key).await;
        Ok(())
    }

    /// Add a trigger to the job and recompute its next fire time.
    pub async fn add_trigger(&self, trigger: AnyTrigger) {
        self.job.with_triggers(|triggers| triggers.push(trigger)).await;
        self.scheduler.refresh_job(&self.key).await;
    }

    /// Remove every trigger whose expression equals `expression` and
    /// recompute the job's next fire time.
    pub async fn remove_trigger(&self, expression: &str) {
        self.job
            .with_triggers(|triggers| {
                triggers.retain(|t| crate::trigger::Trigger::expression(t) != expression);
            })
            .await;
        self.scheduler.refresh_job(&self.key).await;
    }

    /// Remove all triggers and recompute the job's next fire time (which
    /// will become "never" until a new trigger is added).
    pub async fn clear_triggers(&self) {
        self.job.with_triggers(|triggers| triggers.clear()).await;
        self.scheduler.refresh_job(&self.key).await;
    }
}
