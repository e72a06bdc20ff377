//! An in-process job scheduler driven by extended cron expressions.
//!
//! A [`Scheduler`] holds a registry of jobs keyed by arbitrary user data,
//! each armed with one or more [`AnyTrigger`]s. Once [`Scheduler::start`] is
//! called, each job's single-shot timer is kept armed against the earliest
//! upcoming occurrence across its triggers; callback errors are delivered to
//! [`JobException`] subscribers rather than returned from any call site.
//!
//! ```no_run
//! use chronform::{Scheduler, AnyTrigger};
//!
//! # async fn run() -> chronform::error::Result<()> {
//! let scheduler: Scheduler<&'static str> = Scheduler::new();
//! scheduler.schedule_job(
//!     "heartbeat",
//!     |_ctx| Ok(()),
//!     vec![AnyTrigger::create("0/15 * * * * ?")?],
//! )?;
//! scheduler.start()?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod cron;
pub mod error;
pub mod instant;
pub mod job;
pub mod job_info;
pub mod scheduler;
pub mod trigger;

pub use clock::{Clock, FixedClock, SystemClock};
pub use cron::{CronExpression, CronTrigger};
pub use error::{JobError, SchedulerError};
pub use instant::Instant;
pub use job::ExecutionContext;
pub use job_info::JobInfo;
pub use scheduler::{JobException, Scheduler, SchedulerConfig};
pub use trigger::{AnyTrigger, ManualTrigger, NowTrigger, Trigger};
