//! Three-state circuit breaker.
//!
//! ```text
//!   Closed ──(streak reaches threshold)──► Open
//!     ▲                                     │ cooldown elapsed
//!     │ probe success                       ▼
//!     └──────────────────────────────── HalfOpen ──(probe failure)──► Open
//! ```
//!
//! Starts Closed and cycles for the process lifetime. Not internally locked:
//! `SafeExchange` keeps it behind its own mutex.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    #[default]
    Closed,
    HalfOpen,
    Open,
}

impl BreakerState {
    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn gauge(self) -> u8 {
        match self {
            BreakerState::Closed => 0,
            BreakerState::HalfOpen => 1,
            BreakerState::Open => 2,
        }
    }

    pub fn from_gauge(v: u8) -> Self {
        match v {
            1 => BreakerState::HalfOpen,
            2 => BreakerState::Open,
            _ => BreakerState::Closed,
        }
    }
}

/// How a request got past the breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeAdmission {
    /// Breaker closed: normal traffic.
    Pass,
    /// Breaker half-open: this request holds one probe slot.
    Probe,
}

#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    fail_streak: u32,
    opened_at: Option<DateTime<Utc>>,
    half_probes: u32,

    threshold: u32,
    cooldown: Duration,
    half_max: u32,
}

impl CircuitBreaker {
    /// A threshold below 1 becomes 3; fewer than 1 half-open probe becomes 1.
    pub fn new(threshold: u32, cooldown: Duration, half_open_probes: u32) -> Self {
        Self {
            state: BreakerState::Closed,
            fail_streak: 0,
            opened_at: None,
            half_probes: 0,
            threshold: if threshold < 1 { 3 } else { threshold },
            cooldown,
            half_max: half_open_probes.max(1),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn fail_streak(&self) -> u32 {
        self.fail_streak
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Probe slots currently held while half-open.
    pub fn half_open_probes(&self) -> u32 {
        self.half_probes
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Gate check. `None` refuses the request.
    ///
    /// Open refuses until the cooldown since opening has elapsed, then moves
    /// to HalfOpen and admits this request as the first probe. HalfOpen admits
    /// up to the configured number of outstanding probes.
    pub fn admit(&mut self, now: DateTime<Utc>) -> Option<ProbeAdmission> {
        match self.state {
            BreakerState::Closed => Some(ProbeAdmission::Pass),
            BreakerState::Open => {
                let cooled = match self.opened_at {
                    Some(at) => (now - at).to_std().unwrap_or_default() >= self.cooldown,
                    None => true,
                };
                if !cooled {
                    return None;
                }
                self.state = BreakerState::HalfOpen;
                self.half_probes = 1;
                Some(ProbeAdmission::Probe)
            }
            BreakerState::HalfOpen => {
                if self.half_probes < self.half_max {
                    self.half_probes += 1;
                    Some(ProbeAdmission::Probe)
                } else {
                    None
                }
            }
        }
    }

    /// Give back a probe slot for a request that a later gate refused.
    pub fn release_probe(&mut self) {
        if self.state == BreakerState::HalfOpen {
            self.half_probes = self.half_probes.saturating_sub(1);
        }
    }

    pub fn on_success(&mut self) {
        match self.state {
            BreakerState::Closed => self.fail_streak = 0,
            BreakerState::HalfOpen => {
                self.state = BreakerState::Closed;
                self.fail_streak = 0;
                self.half_probes = 0;
            }
            // Admission was granted before another caller reopened it.
            BreakerState::Open => {}
        }
    }

    pub fn on_failure(&mut self, now: DateTime<Utc>) {
        match self.state {
            BreakerState::Closed => {
                self.fail_streak = self.fail_streak.saturating_add(1);
                if self.fail_streak >= self.threshold {
                    self.state = BreakerState::Open;
                    self.opened_at = Some(now);
                }
            }
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open;
                self.opened_at = Some(now);
                self.fail_streak = self.threshold;
                self.half_probes = 0;
            }
            BreakerState::Open => self.opened_at = Some(now),
        }
    }
}
