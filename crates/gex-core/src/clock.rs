//! Non-decreasing wall clock for snapshot timestamps.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Wall clock that never goes backwards.
///
/// System time can step back (NTP slew, VM migration); snapshots produced by
/// one session must still carry non-decreasing timestamps.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time, clamped to the last value handed out.
    pub fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    /// Clamp `candidate` against the last value and remember the result.
    pub fn observe(&self, candidate: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self.last.lock();
        let next = match *last {
            Some(prev) if prev > candidate => prev,
            _ => candidate,
        };
        *last = Some(next);
        next
    }
}
