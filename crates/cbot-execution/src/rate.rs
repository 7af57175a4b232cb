//! Sliding one-minute window over successful submissions.
//!
//! A submission in flight holds a reserved slot so concurrent callers cannot
//! pass the cap between admission and the exchange reply.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, Default)]
pub struct RateWindow {
    times: VecDeque<DateTime<Utc>>,
    per_minute_cap: u32,
    reserved: usize,
}

impl RateWindow {
    /// A cap of 0 disables the limit.
    pub fn new(per_minute_cap: u32) -> Self {
        Self {
            times: VecDeque::new(),
            per_minute_cap,
            reserved: 0,
        }
    }

    pub fn cap(&self) -> u32 {
        self.per_minute_cap
    }

    /// Prunes entries older than the window, then reports whether the cap is
    /// already used up by recorded and reserved slots.
    pub fn exceeded(&mut self, now: DateTime<Utc>) -> bool {
        self.prune(now);
        self.per_minute_cap > 0 && self.times.len() + self.reserved >= self.per_minute_cap as usize
    }

    pub fn record(&mut self, t: DateTime<Utc>) {
        self.times.push_back(t);
    }

    /// Hold a slot for a submission that passed the gate.
    pub fn reserve(&mut self) {
        self.reserved += 1;
    }

    /// Turn a reserved slot into a recorded submission at `t`.
    pub fn commit(&mut self, t: DateTime<Utc>) {
        self.release();
        self.record(t);
    }

    /// Drop a reserved slot; the submission failed.
    pub fn release(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Entries still inside the window at `now`.
    pub fn occupancy(&mut self, now: DateTime<Utc>) -> usize {
        self.prune(now);
        self.times.len()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let window = chrono::Duration::from_std(RATE_WINDOW).unwrap_or(chrono::Duration::zero());
        let cutoff = now - window;
        while let Some(front) = self.times.front() {
            if *front > cutoff {
                break;
            }
            self.times.pop_front();
        }
    }
}
