//! The trigger contract and the two trivial trigger kinds.
//!
//! A trigger emits a lazy, ascending sequence of future instants from a
//! given base instant. Triggers form a closed set (three variants) rather
//! than an open trait hierarchy -- see [`AnyTrigger`].

use std::sync::atomic::{AtomicBool, Ordering};

use crate::cron::CronTrigger;
use crate::error::{Result, SchedulerError};
use crate::instant::Instant;

/// A source of future firing instants.
///
/// `upcoming(base)` must return a sequence `s0, s1, ...` such that every
/// `si >= base` and the sequence is non-decreasing. Implementations must not
/// leak state between calls except where semantically required (e.g.
/// [`NowTrigger`] remembers that it already fired once).
pub trait Trigger: Send + Sync {
    /// The expression this trigger was constructed from, for display and
    /// diagnostics.
    fn expression(&self) -> String;

    /// A lazy ascending sequence of instants `>= base`. An empty sequence
    /// means "no further firings".
    fn upcoming<'a>(&'a self, base: Instant) -> Box<dyn Iterator<Item = Instant> + Send + 'a>;
}

/// A one-shot trigger that fires exactly once, at the first base instant it
/// is given, and never again.
#[derive(Debug, Default)]
pub struct NowTrigger {
    fired: AtomicBool,
}

impl NowTrigger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Trigger for NowTrigger {
    fn expression(&self) -> String {
        "now".to_string()
    }

    fn upcoming<'a>(&'a self, base: Instant) -> Box<dyn Iterator<Item = Instant> + Send + 'a> {
        if self.fired.swap(true, Ordering::SeqCst) {
            Box::new(std::iter::empty())
        } else {
            Box::new(std::iter::once(base))
        }
    }
}

/// A trigger that never fires. Triggers registered solely for manual
/// invocation (outside the scheduler's own occurrence machinery) use this.
#[derive(Debug, Default)]
pub struct ManualTrigger;

impl ManualTrigger {
    pub fn new() -> Self {
        Self
    }
}

impl Trigger for ManualTrigger {
    fn expression(&self) -> String {
        "manual".to_string()
    }

    fn upcoming<'a>(&'a self, _base: Instant) -> Box<dyn Iterator<Item = Instant> + Send + 'a> {
        Box::new(std::iter::empty())
    }
}

/// The closed set of trigger kinds a job may be armed with.
#[derive(Debug)]
pub enum AnyTrigger {
    Cron(CronTrigger),
    Now(NowTrigger),
    Manual(ManualTrigger),
}

impl AnyTrigger {
    /// Parse a trigger expression. Tries the literal `"now"` and `"manual"`
    /// expressions first, then falls back to the extended cron grammar.
    pub fn create(expression: &str) -> Result<Self> {
        match expression {
            "now" => Ok(AnyTrigger::Now(NowTrigger::new())),
            "manual" => Ok(AnyTrigger::Manual(ManualTrigger::new())),
            other => CronTrigger::new(other).map(AnyTrigger::Cron).map_err(|_| {
                SchedulerError::Parse {
                    expression: expression.to_string(),
                    reason: "unknown trigger expression".to_string(),
                }
            }),
        }
    }
}

impl Trigger for AnyTrigger {
    fn expression(&self) -> String {
        match self {
            AnyTrigger::Cron(t) => crate::trigger::Trigger::expression(t),
            AnyTrigger::Now(t) => t.expression(),
            AnyTrigger::Manual(t) => t.expression(),
        }
    }

    fn upcoming<'a>(&'a self, base: Instant) -> Box<dyn Iterator<Item = Instant> + Send + 'a> {
        match self {
            AnyTrigger::Cron(t) => crate::trigger::Trigger::upcoming(t, base),
            AnyTrigger::Now(t) => t.upcoming(base),
            AnyTrigger::Manual(t) => t.upcoming(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn instant(y: i32, mo: u32, d: u32) -> Instant {
        FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn now_trigger_fires_once() {
        let trigger = NowTrigger::new();
        let base = instant(2020, 1, 1);
        assert_eq!(trigger.upcoming(base).collect::<Vec<_>>(), vec![base]);
        assert!(trigger.upcoming(base).next().is_none());
    }

    #[test]
    fn manual_trigger_never_fires() {
        let trigger = ManualTrigger::new();
        assert!(trigger.upcoming(instant(2020, 1, 1)).next().is_none());
    }

    #[test]
    fn create_dispatches_to_the_right_kind() {
        assert!(matches!(AnyTrigger::create("now").unwrap(), AnyTrigger::Now(_)));
        assert!(matches!(AnyTrigger::create("manual").unwrap(), AnyTrigger::Manual(_)));
        assert!(matches!(AnyTrigger::create("* * * * * ?").unwrap(), AnyTrigger::Cron(_)));
    }

    #[test]
    fn create_rejects_unknown_expression() {
        assert!(AnyTrigger::create("whenever").is_err());
    }
}
