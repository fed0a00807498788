use chrono::{DateTime, SubsecRound, Utc};

/// Source of "now" for every time-dependent decision.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock truncated to microseconds, the precision of `TIMESTAMPTZ`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}
