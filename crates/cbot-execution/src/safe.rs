//! Safe Exchange: the SINGLE choke-point for order submission.
//!
//! ```text
//! submit_market(symbol, side, qty)
//!     │
//!     ├── ErrorCooldown::can_act(now)   → GateRefusal::CooldownActive
//!     ├── CircuitBreaker::admit(now)    → GateRefusal::BreakerOpen
//!     ├── RateWindow::exceeded(now)     → GateRefusal::RateLimited
//!     ├── DedupGuard::is_duplicate(fp)  → GateRefusal::DuplicateSuppressed
//!     │
//!     └── Exchange::place_market  ◄── up to 1 + max_retries attempts
//! ```
//!
//! Rate and dedup state share one lock; the breaker has its own. Neither lock
//! is held across the exchange call or a backoff sleep. An admitted order
//! reserves its rate slot and fingerprint under the flow lock; the reservation
//! is committed on success and released on final failure.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cbot_risk::ErrorCooldown;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::breaker::{BreakerState, CircuitBreaker, ProbeAdmission};
use crate::clock::{Clock, SystemClock};
use crate::dedup::{order_fingerprint, DedupGuard};
use crate::exchange::{CancelFn, Exchange, ExchangeError, ExchangeResult};
use crate::metrics::{ExecutionMetrics, NoopMetrics};
use crate::rate::RateWindow;
use crate::types::{Account, Order, Side, Ticker};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct SafetyConfig {
    /// Successful submissions allowed per sliding minute. 0 disables.
    pub rate_limit_orders_per_min: u32,
    pub max_order_retries: u32,
    /// Base backoff unit; attempt `n` is followed by a sleep of `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// 0 disables duplicate suppression.
    pub dup_suppress_window: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    pub breaker_half_open_probes: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            rate_limit_orders_per_min: 6,
            max_order_retries: 2,
            retry_backoff: Duration::from_millis(500),
            dup_suppress_window: Duration::from_millis(1500),
            breaker_threshold: 3,
            breaker_cooldown: Duration::from_secs(60),
            breaker_half_open_probes: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The reason a submission was refused before reaching the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateRefusal {
    CooldownActive,
    BreakerOpen,
    RateLimited,
    DuplicateSuppressed,
}

impl GateRefusal {
    /// Short label for logs and metric keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateRefusal::CooldownActive => "cooldown",
            GateRefusal::BreakerOpen => "breaker_open",
            GateRefusal::RateLimited => "rate_limited",
            GateRefusal::DuplicateSuppressed => "duplicate",
        }
    }
}

impl std::fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateRefusal::CooldownActive => write!(f, "GATE_REFUSED: error cooldown active"),
            GateRefusal::BreakerOpen => write!(f, "GATE_REFUSED: circuit breaker open"),
            GateRefusal::RateLimited => write!(f, "GATE_REFUSED: rate limit reached"),
            GateRefusal::DuplicateSuppressed => {
                write!(f, "GATE_REFUSED: duplicate order suppressed")
            }
        }
    }
}

impl std::error::Error for GateRefusal {}

#[derive(Debug)]
pub enum SubmitError {
    /// A gate refused; the exchange was not called.
    Refused(GateRefusal),
    /// Every attempt failed. `source` is the last exchange error.
    Failed { attempts: u32, source: ExchangeError },
}

impl SubmitError {
    pub fn refusal(&self) -> Option<GateRefusal> {
        match self {
            SubmitError::Refused(r) => Some(*r),
            SubmitError::Failed { .. } => None,
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, SubmitError::Refused(_))
    }
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Refused(r) => r.fmt(f),
            SubmitError::Failed { attempts, source } => {
                write!(f, "order failed after {attempts} attempt(s): {source}")
            }
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Refused(r) => Some(r),
            SubmitError::Failed { source, .. } => Some(&**source),
        }
    }
}

impl From<GateRefusal> for SubmitError {
    fn from(r: GateRefusal) -> Self {
        SubmitError::Refused(r)
    }
}

// ---------------------------------------------------------------------------
// SafeExchange
// ---------------------------------------------------------------------------

struct OrderFlow {
    rate: RateWindow,
    dedup: DedupGuard,
}

pub struct SafeExchange<E, C = SystemClock> {
    inner: E,
    cooldown: Arc<ErrorCooldown>,
    clock: C,
    metrics: Arc<dyn ExecutionMetrics>,
    max_retries: u32,
    backoff: Duration,
    flow: Mutex<OrderFlow>,
    breaker: Mutex<CircuitBreaker>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Exchange> SafeExchange<E, SystemClock> {
    /// `cooldown` is the handle from `RiskState::error_cooldown()`, so a final
    /// submission failure here also blocks the decision loop.
    pub fn new(inner: E, cooldown: Arc<ErrorCooldown>, cfg: &SafetyConfig) -> Self {
        SafeExchange::with_clock(inner, cooldown, cfg, SystemClock)
    }
}

impl<E: Exchange, C: Clock> SafeExchange<E, C> {
    pub fn with_clock(inner: E, cooldown: Arc<ErrorCooldown>, cfg: &SafetyConfig, clock: C) -> Self {
        Self {
            inner,
            cooldown,
            clock,
            metrics: Arc::new(NoopMetrics),
            max_retries: cfg.max_order_retries,
            backoff: cfg.retry_backoff,
            flow: Mutex::new(OrderFlow {
                rate: RateWindow::new(cfg.rate_limit_orders_per_min),
                dedup: DedupGuard::new(cfg.dup_suppress_window),
            }),
            breaker: Mutex::new(CircuitBreaker::new(
                cfg.breaker_threshold,
                cfg.breaker_cooldown,
                cfg.breaker_half_open_probes,
            )),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn ExecutionMetrics>) -> Self {
        metrics.set_breaker_state(self.breaker_state());
        self.metrics = metrics;
        self
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn error_cooldown(&self) -> &Arc<ErrorCooldown> {
        &self.cooldown
    }

    pub fn breaker_state(&self) -> BreakerState {
        lock(&self.breaker).state()
    }

    pub fn rate_window_occupancy(&self) -> usize {
        let now = self.clock.now();
        lock(&self.flow).rate.occupancy(now)
    }

    /// Gate, submit with retries, and feed the outcome back.
    pub fn submit_market(&self, symbol: &str, side: Side, qty: f64) -> Result<Order, SubmitError> {
        let now = self.clock.now();
        self.metrics.order_attempted();

        if !self.cooldown.can_act(now) {
            return Err(self.refuse(GateRefusal::CooldownActive, symbol, side, qty));
        }

        let admission = self.with_breaker(|b| b.admit(now));
        let probe = match admission {
            None => return Err(self.refuse(GateRefusal::BreakerOpen, symbol, side, qty)),
            Some(ProbeAdmission::Probe) => true,
            Some(ProbeAdmission::Pass) => false,
        };

        let fp = order_fingerprint(symbol, side, qty);
        let (flow_refusal, occupancy) = {
            let mut flow = lock(&self.flow);
            let refusal = if flow.rate.exceeded(now) {
                Some(GateRefusal::RateLimited)
            } else if flow.dedup.is_duplicate(&fp, now) {
                Some(GateRefusal::DuplicateSuppressed)
            } else {
                flow.rate.reserve();
                flow.dedup.reserve(&fp);
                None
            };
            (refusal, flow.rate.occupancy(now))
        };
        self.metrics.set_rate_window(occupancy);
        if let Some(r) = flow_refusal {
            if probe {
                self.with_breaker(|b| b.release_probe());
            }
            return Err(self.refuse(r, symbol, side, qty));
        }

        let total = self.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        let last_err = loop {
            attempt += 1;
            match self.inner.place_market(symbol, side, qty) {
                Ok(order) => {
                    self.on_placed(&fp);
                    info!(
                        symbol,
                        side = side.as_str(),
                        qty,
                        order_id = %order.order_id,
                        attempt,
                        "order placed"
                    );
                    return Ok(order);
                }
                Err(e) if attempt < total => {
                    debug!(symbol, side = side.as_str(), attempt, error = %e, "order attempt failed; retrying");
                    self.clock.sleep(self.backoff.saturating_mul(attempt));
                }
                Err(e) => break e,
            }
        };

        let now = self.clock.now();
        {
            let mut flow = lock(&self.flow);
            flow.rate.release();
            flow.dedup.release(&fp);
        }
        self.cooldown.note_error(now);
        self.with_breaker(|b| b.on_failure(now));
        self.metrics.order_failed();
        error!(
            symbol,
            side = side.as_str(),
            qty,
            attempts = attempt,
            error = %last_err,
            "order failed after retries"
        );
        Err(SubmitError::Failed {
            attempts: attempt,
            source: last_err,
        })
    }

    fn on_placed(&self, fp: &str) {
        let at = self.clock.now();
        let occupancy = {
            let mut flow = lock(&self.flow);
            flow.rate.commit(at);
            flow.dedup.commit(fp, at);
            flow.rate.occupancy(at)
        };
        self.with_breaker(|b| b.on_success());
        self.metrics.order_placed();
        self.metrics.set_rate_window(occupancy);
    }

    fn refuse(&self, reason: GateRefusal, symbol: &str, side: Side, qty: f64) -> SubmitError {
        debug!(symbol, side = side.as_str(), qty, reason = reason.as_str(), "order refused");
        self.metrics.order_suppressed(&reason);
        SubmitError::Refused(reason)
    }

    /// Runs `f` under the breaker lock and reports any state transition.
    fn with_breaker<T>(&self, f: impl FnOnce(&mut CircuitBreaker) -> T) -> T {
        let (out, before, after, streak) = {
            let mut b = lock(&self.breaker);
            let before = b.state();
            let out = f(&mut *b);
            (out, before, b.state(), b.fail_streak())
        };
        if before != after {
            match after {
                BreakerState::Open => warn!(fail_streak = streak, "circuit breaker OPEN"),
                BreakerState::HalfOpen => warn!("circuit breaker HALF-OPEN; probing"),
                BreakerState::Closed => info!("circuit breaker closed"),
            }
            self.metrics.set_breaker_state(after);
        }
        out
    }
}

impl<E: Exchange, C: Clock> Exchange for SafeExchange<E, C> {
    fn best_bid_ask(&self, symbol: &str) -> ExchangeResult<(f64, f64)> {
        self.inner.best_bid_ask(symbol)
    }

    fn account(&self) -> ExchangeResult<Account> {
        self.inner.account()
    }

    fn place_market(&self, symbol: &str, side: Side, qty: f64) -> ExchangeResult<Order> {
        self.submit_market(symbol, side, qty).map_err(|e| Box::new(e) as ExchangeError)
    }

    fn stream_prices(&self, symbol: &str, out: mpsc::Sender<Ticker>) -> ExchangeResult<CancelFn> {
        self.inner.stream_prices(symbol, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn refusal_display_carries_gate_prefix() {
        for r in [
            GateRefusal::CooldownActive,
            GateRefusal::BreakerOpen,
            GateRefusal::RateLimited,
            GateRefusal::DuplicateSuppressed,
        ] {
            assert!(r.to_string().starts_with("GATE_REFUSED: "), "{r}");
        }
    }

    #[test]
    fn failed_submit_exposes_exchange_error_as_source() {
        let inner: ExchangeError = "exchange 503".into();
        let e = SubmitError::Failed {
            attempts: 3,
            source: inner,
        };
        assert_eq!(e.to_string(), "order failed after 3 attempt(s): exchange 503");
        assert_eq!(e.source().map(|s| s.to_string()).as_deref(), Some("exchange 503"));
        assert_eq!(e.refusal(), None);
        assert!(!e.is_refused());
    }

    #[test]
    fn refused_submit_reports_reason() {
        let e: SubmitError = GateRefusal::RateLimited.into();
        assert!(e.is_refused());
        assert_eq!(e.refusal(), Some(GateRefusal::RateLimited));
        assert_eq!(e.to_string(), "GATE_REFUSED: rate limit reached");
    }
}
