//! Injectable wall-clock source.
//!
//! The scheduler never calls [`chrono::Utc::now`] directly; it goes through
//! a [`Clock`] so that tests can supply a deterministic time source.

use chrono::{FixedOffset, Utc};

use crate::instant::Instant;

/// Returns the current instant with its UTC offset. Must be safe to call
/// concurrently from multiple threads.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The default clock: system UTC time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Utc::now().with_timezone(&FixedOffset::east_opt(0).unwrap())
    }
}

/// A fixed clock for deterministic tests, advanced manually by the caller.
#[derive(Debug)]
pub struct FixedClock(std::sync::Mutex<Instant>);

impl FixedClock {
    pub fn new(initial: Instant) -> Self {
        Self(std::sync::Mutex::new(initial))
    }

    pub fn set(&self, instant: Instant) {
        *self.0.lock().unwrap() = instant;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard += duration;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}
