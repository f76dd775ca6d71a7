//! Hit-or-time interval tracker used to pace automatic yields.

use std::time::{Duration, Instant};

/// Fires every `hits_between_marks` pings or every `period`, whichever
/// comes first.
#[derive(Debug, Clone)]
pub struct ElapsedTracker {
    hits_between_marks: u32,
    period: Duration,
    pings: u32,
    last: Instant,
}

impl ElapsedTracker {
    /// Create a tracker; a zero hit count fires on every ping
    pub fn new(hits_between_marks: u32, period: Duration) -> Self {
        Self {
            hits_between_marks,
            period,
            pings: 0,
            last: Instant::now(),
        }
    }

    /// Count one ping and report whether the interval has elapsed
    ///
    /// Firing resets both the ping count and the clock.
    pub fn interval_has_elapsed(&mut self) -> bool {
        self.pings += 1;
        if self.pings >= self.hits_between_marks {
            self.reset_last_time();
            return true;
        }
        if self.last.elapsed() > self.period {
            self.reset_last_time();
            return true;
        }
        false
    }

    /// Restart the interval from now
    pub fn reset_last_time(&mut self) {
        self.pings = 0;
        self.last = Instant::now();
    }

    /// Pings counted since the last mark
    pub fn pings(&self) -> u32 {
        self.pings
    }
}
