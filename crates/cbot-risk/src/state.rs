use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Error cooldown shared between the trading loop and the execution wrapper.
///
/// This is the only part of [`RiskState`] touched from more than one caller,
/// so it carries its own lock and is handed out behind an `Arc`.
#[derive(Debug)]
pub struct ErrorCooldown {
    cooldown: Duration,
    last_error: Mutex<Option<DateTime<Utc>>>,
}

impl ErrorCooldown {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_error: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_error(&self) -> Option<DateTime<Utc>> {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn note_error(&self, now: DateTime<Utc>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
    }

    /// True once `cooldown` has elapsed since the last error.
    /// No recorded error means no cooldown is active.
    pub fn can_act(&self, now: DateTime<Utc>) -> bool {
        match self.last_error() {
            None => true,
            Some(at) => elapsed(at, now) >= self.cooldown,
        }
    }
}

/// Day-scoped risk bookkeeping. Single writer: the driving loop.
#[derive(Debug)]
pub struct RiskState {
    pub equity_at_open_usd: f64,
    pub equity_now_usd: f64,
    pub orders_today: u32,
    pub realized_pnl_usd: f64,

    /// Anchored local midnight of the current trading day, in UTC.
    pub day_open: DateTime<Utc>,

    cooldown: Arc<ErrorCooldown>,

    /// FIFO window of recent trade prices (oldest first).
    prices: VecDeque<f64>,
}

impl RiskState {
    pub fn new(equity_at_open_usd: f64, error_cooldown: Duration, day_open: DateTime<Utc>) -> Self {
        Self {
            equity_at_open_usd,
            equity_now_usd: equity_at_open_usd,
            orders_today: 0,
            realized_pnl_usd: 0.0,
            day_open,
            cooldown: Arc::new(ErrorCooldown::new(error_cooldown)),
            prices: VecDeque::new(),
        }
    }

    /// Handle for the execution wrapper; errors it records block this state too.
    pub fn error_cooldown(&self) -> Arc<ErrorCooldown> {
        Arc::clone(&self.cooldown)
    }

    /// Wholesale reset at a day boundary. The error cooldown is not day-scoped
    /// and survives the reset.
    pub fn reset_day(&mut self, new_equity: f64, new_day_open: DateTime<Utc>) {
        self.equity_at_open_usd = new_equity;
        self.equity_now_usd = new_equity;
        self.orders_today = 0;
        self.realized_pnl_usd = 0.0;
        self.day_open = new_day_open;
        self.prices.clear();
    }

    pub fn update_equity(&mut self, current: f64) {
        self.equity_now_usd = current;
    }

    /// Kill-switch check. A non-positive open equity never trips.
    pub fn breach_daily_loss(&self, max_loss_pct: f64) -> bool {
        if self.equity_at_open_usd <= 0.0 {
            return false;
        }
        let loss_pct =
            (self.equity_at_open_usd - self.equity_now_usd) / self.equity_at_open_usd * 100.0;
        loss_pct >= max_loss_pct
    }

    pub fn note_error(&self, now: DateTime<Utc>) {
        self.cooldown.note_error(now);
    }

    pub fn can_act(&self, now: DateTime<Utc>) -> bool {
        self.cooldown.can_act(now)
    }

    pub fn count_order(&mut self) {
        self.orders_today = self.orders_today.saturating_add(1);
    }

    pub fn record_realized_pnl(&mut self, delta_usd: f64) {
        self.realized_pnl_usd += delta_usd;
    }

    pub fn push_price(&mut self, px: f64, lookback: usize) {
        self.prices.push_back(px);
        while self.prices.len() > lookback {
            self.prices.pop_front();
        }
    }

    pub fn prices(&self) -> &VecDeque<f64> {
        &self.prices
    }

    /// Population standard deviation of simple per-tick returns over the
    /// window. Steps from a zero (or non-finite) price are skipped; fewer than
    /// two usable returns yields 0. Not annualized.
    pub fn realized_vol(&self) -> f64 {
        let rets: Vec<f64> = self
            .prices
            .iter()
            .zip(self.prices.iter().skip(1))
            .filter(|(prev, _)| **prev != 0.0)
            .map(|(prev, cur)| (cur - prev) / prev)
            .filter(|r| r.is_finite())
            .collect();

        if rets.len() < 2 {
            return 0.0;
        }

        let n = rets.len() as f64;
        let mean = rets.iter().sum::<f64>() / n;
        let var = rets.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n;
        var.sqrt()
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    // A clock that went backwards counts as no time elapsed.
    (now - since).to_std().unwrap_or_default()
}
