use std::fmt;

/// Static risk configuration. Immutable for the life of a trading loop.
#[derive(Clone, Debug, PartialEq)]
pub struct Limits {
    /// Maximum total position notional in quote currency.
    pub max_position_usd: f64,

    /// Maximum notional for a single order.
    pub max_order_notional_usd: f64,

    /// Order count cap per trading day.
    pub max_orders_per_day: u32,

    /// Daily kill-switch threshold, in percent of equity at day open.
    pub max_loss_pct_day: f64,

    /// Enable volatility-aware sizing.
    pub vol_sizing_on: bool,

    /// Number of ticks kept for realized volatility.
    pub vol_lookback: usize,

    /// Target risk per trade in basis points of current equity (50 = 0.50%).
    pub target_risk_bp: f64,
}

impl Limits {
    /// Conservative defaults: small fixed size, no vol sizing.
    pub fn sane_defaults() -> Self {
        Self {
            max_position_usd: 1_000.0,
            max_order_notional_usd: 100.0,
            max_orders_per_day: 50,
            max_loss_pct_day: 2.0,
            vol_sizing_on: false,
            vol_lookback: 60,
            target_risk_bp: 50.0,
        }
    }
}

/// Why a trade intent was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    DailyLossBreached,
    DailyOrderCap,
    /// Price was zero, negative or not finite.
    InvalidPrice,
    PositionLimitReached,
    NoPositionToSell,
    /// Sizing produced nothing worth sending.
    ZeroSize,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::DailyLossBreached => "daily loss limit breached",
            DenyReason::DailyOrderCap => "daily order cap reached",
            DenyReason::InvalidPrice => "invalid price",
            DenyReason::PositionLimitReached => "position limit reached",
            DenyReason::NoPositionToSell => "no position to sell",
            DenyReason::ZeroSize => "order size is zero",
        };
        f.write_str(s)
    }
}

/// Outcome of evaluating one trade intent. Built fresh per call.
///
/// A denied decision always carries a reason and zeroed sizes; callers must
/// not submit an order unless `allow` is true.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub allow: bool,
    pub reason: Option<DenyReason>,
    /// Order size in quote currency.
    pub notional_usd: f64,
    /// Order size in base asset.
    pub qty: f64,
}

impl Decision {
    pub fn deny(reason: DenyReason) -> Self {
        Self {
            allow: false,
            reason: Some(reason),
            notional_usd: 0.0,
            qty: 0.0,
        }
    }

    pub fn approve(notional_usd: f64, qty: f64) -> Self {
        Self {
            allow: true,
            reason: None,
            notional_usd,
            qty,
        }
    }

    /// Human-readable denial reason, `None` when allowed.
    pub fn reason_text(&self) -> Option<String> {
        self.reason.map(|r| r.to_string())
    }
}
