use crate::{Decision, DenyReason, Limits, RiskState};

// ---------------------------------------------------------------------------
// Shared checks
// ---------------------------------------------------------------------------

/// Checks common to both sides, in priority order:
/// kill-switch, daily order cap, then price sanity.
fn precheck(st: &RiskState, lim: &Limits, price: f64) -> Option<DenyReason> {
    if st.breach_daily_loss(lim.max_loss_pct_day) {
        return Some(DenyReason::DailyLossBreached);
    }
    if st.orders_today >= lim.max_orders_per_day {
        return Some(DenyReason::DailyOrderCap);
    }
    if !price.is_finite() || price <= 0.0 {
        return Some(DenyReason::InvalidPrice);
    }
    None
}

/// Target order notional before exposure checks.
///
/// With vol sizing on and a positive realized vol:
/// `(target_risk_bp / 10_000) * equity_now / vol`, clamped to
/// `[0, max_order_notional_usd]`. Otherwise the fixed per-order maximum.
pub fn target_notional(st: &RiskState, lim: &Limits) -> f64 {
    let cap = lim.max_order_notional_usd.max(0.0);
    if !lim.vol_sizing_on {
        return cap;
    }

    let vol = st.realized_vol();
    if vol <= 0.0 {
        return cap;
    }

    let raw = (lim.target_risk_bp / 10_000.0) * st.equity_now_usd / vol;
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, cap)
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Size a buy. `current_notional_usd` is the notional already held.
///
/// The order is shrunk to the remaining position headroom; no headroom denies.
pub fn decide_buy(st: &RiskState, lim: &Limits, price: f64, current_notional_usd: f64) -> Decision {
    if let Some(reason) = precheck(st, lim, price) {
        return Decision::deny(reason);
    }

    let headroom = lim.max_position_usd - current_notional_usd.max(0.0);
    if headroom <= 0.0 {
        return Decision::deny(DenyReason::PositionLimitReached);
    }

    let notional = target_notional(st, lim).min(headroom);
    if notional <= 0.0 {
        return Decision::deny(DenyReason::ZeroSize);
    }

    Decision::approve(notional, notional / price)
}

/// Size a sell. `held_qty` is the base quantity currently held; the order
/// never exceeds it.
pub fn decide_sell(st: &RiskState, lim: &Limits, price: f64, held_qty: f64) -> Decision {
    if let Some(reason) = precheck(st, lim, price) {
        return Decision::deny(reason);
    }

    if held_qty <= 0.0 {
        return Decision::deny(DenyReason::NoPositionToSell);
    }

    let qty = (target_notional(st, lim) / price).min(held_qty);
    if qty <= 0.0 {
        return Decision::deny(DenyReason::ZeroSize);
    }

    Decision::approve(qty * price, qty)
}
