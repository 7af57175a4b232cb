//! Scenario: Circuit Breaker Blocks Exchange Traffic
//!
//! # Invariant under test
//!
//! After `breaker_threshold` consecutive final failures the breaker is Open
//! and NO submission reaches the exchange until `breaker_cooldown` has
//! elapsed from the moment it opened. The first request after the cooldown is
//! a single half-open probe; its outcome closes or reopens the breaker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cbot_execution::{
    Account, BreakerState, CancelFn, Clock, Exchange, ExchangeResult, ExecutionCounters,
    GateRefusal, Order, SafeExchange, SafetyConfig, Side, SubmitError, Ticker,
};
use cbot_risk::ErrorCooldown;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

/// Fails while `fail_remaining > 0`, then fills. Counts every call.
#[derive(Default)]
struct ScriptedExchange {
    calls: AtomicU32,
    fail_remaining: AtomicU32,
}

impl ScriptedExchange {
    #[allow(dead_code)]
    fn failing(n: u32) -> Self {
        let x = Self::default();
        x.fail_remaining.store(n, Ordering::SeqCst);
        x
    }

    #[allow(dead_code)]
    fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Exchange for ScriptedExchange {
    fn best_bid_ask(&self, _symbol: &str) -> ExchangeResult<(f64, f64)> {
        Ok((99.0, 101.0))
    }

    fn account(&self) -> ExchangeResult<Account> {
        Ok(Account::default())
    }

    fn place_market(&self, symbol: &str, side: Side, qty: f64) -> ExchangeResult<Order> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if failing {
            return Err(format!("exchange unavailable (call {n})").into());
        }
        Ok(Order {
            order_id: format!("o-{n}"),
            symbol: symbol.to_string(),
            side,
            qty,
            avg_price: Some(100.0),
            status: "FILLED".to_string(),
            submitted_at: Utc.timestamp_opt(0, 0).unwrap(),
        })
    }

    fn stream_prices(&self, _symbol: &str, _out: mpsc::Sender<Ticker>) -> ExchangeResult<CancelFn> {
        Ok(Box::new(|| {}))
    }
}

/// Virtual time. `sleep` advances it and records the duration.
struct TestClock {
    now: Mutex<DateTime<Utc>>,
    slept: Mutex<Vec<Duration>>,
}

impl TestClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()),
            slept: Mutex::new(Vec::new()),
        })
    }

    fn advance(&self, d: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(d).unwrap();
    }

    #[allow(dead_code)]
    fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, d: Duration) {
        self.slept.lock().unwrap().push(d);
        self.advance(d);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn cfg() -> SafetyConfig {
    SafetyConfig {
        rate_limit_orders_per_min: 0,
        max_order_retries: 0,
        retry_backoff: Duration::ZERO,
        dup_suppress_window: Duration::ZERO,
        breaker_threshold: 3,
        breaker_cooldown: Duration::from_secs(30),
        breaker_half_open_probes: 1,
    }
}

type Safe = SafeExchange<Arc<ScriptedExchange>, Arc<TestClock>>;

fn build(ex: Arc<ScriptedExchange>, clock: Arc<TestClock>) -> (Safe, Arc<ExecutionCounters>) {
    // Error cooldown out of the way so only the breaker gates.
    let cooldown = Arc::new(ErrorCooldown::new(Duration::ZERO));
    let counters = Arc::new(ExecutionCounters::new());
    let safe = SafeExchange::with_clock(ex, cooldown, &cfg(), clock).with_metrics(counters.clone());
    (safe, counters)
}

fn trip(safe: &Safe, clock: &TestClock) {
    for i in 0..3 {
        let err = safe.submit_market("BTC-USD", Side::Buy, 0.01 * (i + 1) as f64).unwrap_err();
        assert!(matches!(err, SubmitError::Failed { attempts: 1, .. }));
        clock.advance(Duration::from_secs(1));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn breaker_opens_after_threshold_failures() {
    let ex = Arc::new(ScriptedExchange::failing(u32::MAX));
    let clock = TestClock::new();
    let (safe, counters) = build(ex.clone(), clock.clone());

    trip(&safe, &clock);
    assert_eq!(safe.breaker_state(), BreakerState::Open);
    assert_eq!(ex.calls(), 3);

    let snap = counters.snapshot();
    assert_eq!(snap.failed, 3);
    assert_eq!(snap.breaker_state, BreakerState::Open);
}

#[test]
fn open_breaker_never_calls_exchange_before_cooldown() {
    let ex = Arc::new(ScriptedExchange::failing(3));
    let clock = TestClock::new();
    let (safe, counters) = build(ex.clone(), clock.clone());

    trip(&safe, &clock);
    // Opened at t0+2s. Hammer it for the next 27 seconds.
    for _ in 0..27 {
        let err = safe.submit_market("BTC-USD", Side::Buy, 1.0).unwrap_err();
        assert_eq!(err.refusal(), Some(GateRefusal::BreakerOpen));
        clock.advance(Duration::from_secs(1));
    }
    assert_eq!(ex.calls(), 3, "no call may reach the exchange while open");
    assert_eq!(counters.snapshot().suppressed_breaker, 27);
}

#[test]
fn probe_success_closes_breaker() {
    let ex = Arc::new(ScriptedExchange::failing(3));
    let clock = TestClock::new();
    let (safe, _counters) = build(ex.clone(), clock.clone());

    trip(&safe, &clock);
    clock.advance(Duration::from_secs(30));

    let order = safe.submit_market("BTC-USD", Side::Buy, 1.0).unwrap();
    assert_eq!(order.symbol, "BTC-USD");
    assert_eq!(safe.breaker_state(), BreakerState::Closed);
    assert_eq!(ex.calls(), 4);

    safe.submit_market("BTC-USD", Side::Buy, 2.0).unwrap();
    assert_eq!(ex.calls(), 5);
}

#[test]
fn probe_failure_reopens_and_restarts_cooldown() {
    let ex = Arc::new(ScriptedExchange::failing(4));
    let clock = TestClock::new();
    let (safe, _counters) = build(ex.clone(), clock.clone());

    trip(&safe, &clock);
    clock.advance(Duration::from_secs(30));
    let err = safe.submit_market("BTC-USD", Side::Buy, 1.0).unwrap_err();
    assert!(!err.is_refused());
    assert_eq!(safe.breaker_state(), BreakerState::Open);
    assert_eq!(ex.calls(), 4);

    clock.advance(Duration::from_secs(29));
    let err = safe.submit_market("BTC-USD", Side::Buy, 1.0).unwrap_err();
    assert_eq!(err.refusal(), Some(GateRefusal::BreakerOpen));
    assert_eq!(ex.calls(), 4);

    clock.advance(Duration::from_secs(1));
    safe.submit_market("BTC-USD", Side::Buy, 1.0).unwrap();
    assert_eq!(safe.breaker_state(), BreakerState::Closed);
}

#[test]
fn refused_probe_does_not_strand_half_open() {
    let ex = Arc::new(ScriptedExchange::default());
    let clock = TestClock::new();
    let cooldown = Arc::new(ErrorCooldown::new(Duration::ZERO));
    let mut c = cfg();
    c.dup_suppress_window = Duration::from_secs(120);
    let safe = SafeExchange::with_clock(ex.clone(), cooldown, &c, clock.clone());

    // One success to seed the dedup fingerprint, then trip with other sizes.
    safe.submit_market("BTC-USD", Side::Buy, 5.0).unwrap();
    ex.fail_next(3);
    trip(&safe, &clock);
    clock.advance(Duration::from_secs(30));

    // Probe slot taken, then dedup refuses: slot must come back.
    let err = safe.submit_market("BTC-USD", Side::Buy, 5.0).unwrap_err();
    assert_eq!(err.refusal(), Some(GateRefusal::DuplicateSuppressed));
    assert_eq!(safe.breaker_state(), BreakerState::HalfOpen);

    safe.submit_market("BTC-USD", Side::Buy, 6.0).unwrap();
    assert_eq!(safe.breaker_state(), BreakerState::Closed);
}
