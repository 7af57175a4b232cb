//! cbot-risk
//!
//! Daily risk bookkeeping and order sizing.
//!
//! Goals:
//! - Daily loss kill-switch against equity at day open
//! - Daily order cap
//! - Error cooldown shared with the execution wrapper
//! - Volatility-aware sizing from a rolling price window
//! - Position headroom for buys, held-quantity cap for sells
//!
//! Deterministic, pure logic. No IO, no wall-clock: callers pass `now`.

mod engine;
mod state;
mod types;

pub use engine::{decide_buy, decide_sell, target_notional};
pub use state::{ErrorCooldown, RiskState};
pub use types::*;
