use std::sync::Mutex;
use std::time::Duration;

use cbot_execution::Clock;
use chrono::{DateTime, TimeZone, Utc};

/// Virtual time. Every `sleep` is recorded and moves the clock forward by
/// the slept duration.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for `Utc.with_ymd_and_hms(..)`. Panics on an invalid date.
    pub fn at_utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        match Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single() {
            Some(t) => Self::new(t),
            None => panic!("invalid test date {y}-{mo}-{d} {h}:{mi}:{s}"),
        }
    }

    pub fn advance(&self, d: Duration) {
        let step = match chrono::Duration::from_std(d) {
            Ok(step) => step,
            Err(_) => panic!("duration out of range: {d:?}"),
        };
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += step;
    }

    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = t;
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn sleep(&self, d: Duration) {
        self.sleeps.lock().unwrap_or_else(|p| p.into_inner()).push(d);
        self.advance(d);
    }
}
