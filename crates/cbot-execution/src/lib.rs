//! cbot-execution
//!
//! The execution-safety layer around the exchange capability.
//!
//! `SafeExchange` is the single choke-point for order submission. Every call
//! to `submit_market` passes four gates in order and is refused with a
//! `GateRefusal` if any fails, without touching the exchange:
//!
//! 1. error cooldown (shared with `RiskState`)
//! 2. circuit breaker (Closed / Open / HalfOpen)
//! 3. sliding 60-second rate window
//! 4. duplicate suppression on (symbol, side, qty)
//!
//! Admitted orders are retried with linear backoff; outcomes feed back into
//! the breaker, the rate window, the dedup fingerprint and the cooldown.

mod breaker;
mod clock;
mod dedup;
mod exchange;
mod metrics;
mod rate;
mod safe;
mod types;

pub use breaker::{BreakerState, CircuitBreaker, ProbeAdmission};
pub use clock::{Clock, SystemClock};
pub use dedup::{order_fingerprint, DedupGuard};
pub use exchange::{CancelFn, Exchange, ExchangeError, ExchangeResult};
pub use metrics::{CountersSnapshot, ExecutionCounters, ExecutionMetrics, NoopMetrics};
pub use rate::{RateWindow, RATE_WINDOW};
pub use safe::{GateRefusal, SafeExchange, SafetyConfig, SubmitError};
pub use types::{Account, Order, Side, Ticker};
