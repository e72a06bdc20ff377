//! Scheduler error types.
//!
//! All public operations surface errors through [`SchedulerError`]. Errors
//! raised by user callbacks never propagate through this type -- they are
//! delivered to [`crate::scheduler::JobException`] subscribers instead, per
//! the propagation policy in the scheduler design.

use std::fmt;
use std::sync::Arc;

/// Unified error type for the scheduler crate.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A cron or trigger expression could not be parsed.
    #[error("failed to parse expression `{expression}`: {reason}")]
    Parse { expression: String, reason: String },

    /// `schedule_job`/`schedule_async_job` was called with a key already
    /// present in the registry.
    #[error("job already scheduled")]
    DuplicateKey,

    /// An operation referenced a job key that is not registered.
    #[error("job not found")]
    NotFound,

    /// An operation was attempted on a job or scheduler that has already
    /// been disposed.
    #[error("object has been disposed")]
    ObjectDisposed,

    /// Catch-all for invariant violations that indicate a programmer bug
    /// rather than a recoverable condition.
    #[error("internal scheduler error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// The error raised by a user callback, surfaced via the `JobException`
/// observer rather than returned from a public API call.
///
/// Held as an `Arc` (rather than `Box`) so that [`crate::scheduler::JobException`]
/// can be cheaply cloned to every subscriber of the broadcast observer, the
/// same way the kernel's event bus wraps its payloads.
///
/// If the source error is a single-inner-error aggregate, callers should
/// unwrap to the inner error before constructing this type -- see
/// [`crate::job::unwrap_single_inner`].
#[derive(Debug, Clone)]
pub struct JobError(pub Arc<dyn std::error::Error + Send + Sync>);

impl From<Box<dyn std::error::Error + Send + Sync>> for JobError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        JobError(Arc::from(err))
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}
