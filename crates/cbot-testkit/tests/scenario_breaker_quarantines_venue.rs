//! Scenario: Breaker Quarantines A Failing Venue End To End
//!
//! # Invariant under test
//!
//! Driving the full loop against a venue that keeps failing, the exchange sees
//! exactly `threshold * (1 + retries)` submissions before the breaker opens,
//! then none at all until the breaker cooldown has elapsed. Intermediate
//! retry failures do not count toward the threshold.

use std::sync::Arc;
use std::time::Duration;

use cbot_day::{DayManager, TradingCalendar};
use cbot_execution::{BreakerState, ExecutionCounters, GateRefusal, SafetyConfig};
use cbot_risk::Limits;
use cbot_runtime::{Intent, LoopConfig, TradingLoop};
use cbot_testkit::{ManualClock, PaperExchange};

#[test]
fn failing_venue_sees_no_traffic_while_open() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::at_utc(2026, 3, 2, 14, 0, 0));
    let ex = Arc::new(PaperExchange::with_clock(10_000.0, clock.clone()));
    ex.set_quote("BTC-USD", 99.0, 101.0);
    ex.set_fail_always(true);

    let cfg = LoopConfig {
        symbol: "BTC-USD".to_string(),
        limits: Limits::sane_defaults(),
        // No error cooldown: isolate the breaker.
        error_cooldown: Duration::ZERO,
        checkpoint_interval: Duration::from_secs(60),
        safety: SafetyConfig {
            rate_limit_orders_per_min: 0,
            max_order_retries: 2,
            retry_backoff: Duration::from_millis(50),
            dup_suppress_window: Duration::ZERO,
            breaker_threshold: 2,
            breaker_cooldown: Duration::from_secs(120),
            breaker_half_open_probes: 1,
        },
    };
    let counters = Arc::new(ExecutionCounters::new());
    let day = DayManager::new(TradingCalendar::utc(), dir.path().join("day.json"));
    let (mut lp, _) =
        TradingLoop::start(cfg, day, ex.clone(), clock.clone(), counters.clone()).unwrap();

    for _ in 0..2 {
        let r = lp.tick(Intent::Buy);
        assert!(r.error.is_some());
        clock.advance(Duration::from_secs(1));
    }
    assert_eq!(ex.attempts(), 6);
    assert_eq!(lp.exchange().breaker_state(), BreakerState::Open);

    for _ in 0..100 {
        let r = lp.tick(Intent::Buy);
        assert_eq!(r.refusal, Some(GateRefusal::BreakerOpen));
        clock.advance(Duration::from_secs(1));
    }
    assert_eq!(ex.attempts(), 6);

    // Venue recovers; the probe after the cooldown closes the breaker.
    ex.set_fail_always(false);
    clock.advance(Duration::from_secs(20));
    let r = lp.tick(Intent::Buy);
    assert!(r.order.is_some(), "{r:?}");
    assert_eq!(lp.exchange().breaker_state(), BreakerState::Closed);

    let snap = counters.snapshot();
    assert_eq!(snap.failed, 2);
    assert_eq!(snap.suppressed_breaker, 100);
    assert_eq!(snap.breaker_state, BreakerState::Closed);
}
