//! Execution metrics recorder.
//!
//! The safety layer reports through an injected `ExecutionMetrics` handle
//! instead of process-global registries. `ExecutionCounters` is the in-memory
//! implementation used by the paper loop and by tests; an exporter can wrap
//! it or implement the trait directly.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::{BreakerState, GateRefusal};

pub trait ExecutionMetrics: Send + Sync {
    /// One call per submission, before any gate. Retries are not counted
    /// again, so attempted = placed + failed + suppressed.
    fn order_attempted(&self);
    fn order_placed(&self);
    /// The final attempt of a submission failed.
    fn order_failed(&self);
    /// A gate refused the submission before the exchange was called.
    fn order_suppressed(&self, reason: &GateRefusal);
    fn set_breaker_state(&self, state: BreakerState);
    fn set_rate_window(&self, occupancy: usize);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl ExecutionMetrics for NoopMetrics {
    fn order_attempted(&self) {}
    fn order_placed(&self) {}
    fn order_failed(&self) {}
    fn order_suppressed(&self, _reason: &GateRefusal) {}
    fn set_breaker_state(&self, _state: BreakerState) {}
    fn set_rate_window(&self, _occupancy: usize) {}
}

#[derive(Debug, Default)]
pub struct ExecutionCounters {
    attempted: AtomicU64,
    placed: AtomicU64,
    failed: AtomicU64,
    suppressed_cooldown: AtomicU64,
    suppressed_breaker: AtomicU64,
    suppressed_rate: AtomicU64,
    suppressed_duplicate: AtomicU64,
    breaker_state: AtomicU8,
    rate_window: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub attempted: u64,
    pub placed: u64,
    pub failed: u64,
    pub suppressed_cooldown: u64,
    pub suppressed_breaker: u64,
    pub suppressed_rate: u64,
    pub suppressed_duplicate: u64,
    pub breaker_state: BreakerState,
    pub rate_window: u64,
}

impl CountersSnapshot {
    pub fn suppressed_total(&self) -> u64 {
        self.suppressed_cooldown
            + self.suppressed_breaker
            + self.suppressed_rate
            + self.suppressed_duplicate
    }
}

impl ExecutionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            placed: self.placed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            suppressed_cooldown: self.suppressed_cooldown.load(Ordering::Relaxed),
            suppressed_breaker: self.suppressed_breaker.load(Ordering::Relaxed),
            suppressed_rate: self.suppressed_rate.load(Ordering::Relaxed),
            suppressed_duplicate: self.suppressed_duplicate.load(Ordering::Relaxed),
            breaker_state: BreakerState::from_gauge(self.breaker_state.load(Ordering::Relaxed)),
            rate_window: self.rate_window.load(Ordering::Relaxed),
        }
    }
}

impl ExecutionMetrics for ExecutionCounters {
    fn order_attempted(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    fn order_placed(&self) {
        self.placed.fetch_add(1, Ordering::Relaxed);
    }

    fn order_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn order_suppressed(&self, reason: &GateRefusal) {
        let counter = match reason {
            GateRefusal::CooldownActive => &self.suppressed_cooldown,
            GateRefusal::BreakerOpen => &self.suppressed_breaker,
            GateRefusal::RateLimited => &self.suppressed_rate,
            GateRefusal::DuplicateSuppressed => &self.suppressed_duplicate,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn set_breaker_state(&self, state: BreakerState) {
        self.breaker_state.store(state.gauge(), Ordering::Relaxed);
    }

    fn set_rate_window(&self, occupancy: usize) {
        self.rate_window.store(occupancy as u64, Ordering::Relaxed);
    }
}
