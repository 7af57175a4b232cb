use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cbot_config::BotConfig;
use cbot_day::{DayManager, SnapshotLock, Startup};
use cbot_execution::{
    Clock, Exchange, ExecutionMetrics, GateRefusal, Order, SafeExchange, SafetyConfig, Side,
    SubmitError,
};
use cbot_risk::{decide_buy, decide_sell, Decision, Limits, RiskState};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

const QTY_EPS: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq)]
pub struct LoopConfig {
    pub symbol: String,
    pub limits: Limits,
    pub error_cooldown: Duration,
    pub checkpoint_interval: Duration,
    pub safety: SafetyConfig,
}

impl LoopConfig {
    pub fn from_bot_config(cfg: &BotConfig) -> Self {
        Self {
            symbol: cfg.symbol.clone(),
            limits: cfg.to_limits(),
            error_cooldown: cfg.error_cooldown(),
            checkpoint_interval: cfg.checkpoint_interval(),
            safety: cfg.safety_config(),
        }
    }
}

/// What the signal source wants this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Hold,
    Buy,
    Sell,
}

/// Outcome of one tick. `error` holds read or submission failures; gate
/// refusals are reported separately in `refusal`.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub mid: Option<f64>,
    pub equity_usd: Option<f64>,
    pub rolled_over: bool,
    pub kill_switch: bool,
    pub decision: Option<Decision>,
    pub order: Option<Order>,
    pub refusal: Option<GateRefusal>,
    pub error: Option<String>,
    pub checkpointed: bool,
}

impl TickReport {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            mid: None,
            equity_usd: None,
            rolled_over: false,
            kill_switch: false,
            decision: None,
            order: None,
            refusal: None,
            error: None,
            checkpointed: false,
        }
    }
}

pub struct TradingLoop<E: Exchange, C: Clock> {
    cfg: LoopConfig,
    day: DayManager,
    /// Held for the loop's lifetime; no other process writes this snapshot.
    _lock: SnapshotLock,
    state: RiskState,
    exchange: SafeExchange<E, C>,
    last_checkpoint: DateTime<Utc>,
    /// Average entry of the position opened by this loop. `None` when the
    /// position predates the process, so its P&L is unknown.
    cost_basis: Option<f64>,
    kill_switch_logged: bool,
}

impl<E: Exchange, C: Clock> TradingLoop<E, C> {
    /// Lock the snapshot path, read starting equity, seed or resume today's
    /// snapshot, and wrap the exchange. Fails if another process holds the
    /// snapshot or the account cannot be read.
    pub fn start(
        cfg: LoopConfig,
        day: DayManager,
        exchange: E,
        clock: C,
        metrics: Arc<dyn ExecutionMetrics>,
    ) -> Result<(Self, Startup)> {
        let lock = day.lock().context("claim snapshot path")?;
        let now = clock.now();
        let account = exchange
            .account()
            .map_err(anyhow::Error::msg)
            .context("read account equity at startup")?;
        let equity = account.equity_usd;

        let mut state = RiskState::new(equity, cfg.error_cooldown, day.calendar().day_open(now));
        let startup = day.init_at_startup(now, equity, &mut state);
        state.update_equity(equity);

        let exchange = SafeExchange::with_clock(exchange, state.error_cooldown(), &cfg.safety, clock)
            .with_metrics(metrics);

        let next_open = day.calendar().next_open(now);
        info!(
            symbol = %cfg.symbol,
            startup = ?startup.kind,
            equity,
            equity_open = state.equity_at_open_usd,
            orders_today = state.orders_today,
            next_open = %next_open,
            "trading loop started"
        );

        Ok((
            Self {
                cfg,
                day,
                _lock: lock,
                state,
                exchange,
                last_checkpoint: now,
                cost_basis: None,
                kill_switch_logged: false,
            },
            startup,
        ))
    }

    pub fn config(&self) -> &LoopConfig {
        &self.cfg
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn day(&self) -> &DayManager {
        &self.day
    }

    pub fn exchange(&self) -> &SafeExchange<E, C> {
        &self.exchange
    }

    /// Time until the next local midnight.
    pub fn time_to_rollover(&self) -> chrono::Duration {
        let now = self.exchange.clock().now();
        self.day.calendar().next_open(now) - now
    }

    pub fn tick(&mut self, intent: Intent) -> TickReport {
        let now = self.exchange.clock().now();
        let mut report = TickReport::new(now);
        let symbol = self.cfg.symbol.clone();

        match self.exchange.best_bid_ask(&symbol) {
            Ok((bid, ask)) => {
                let mid = (bid + ask) / 2.0;
                if mid.is_finite() && mid > 0.0 {
                    self.state.push_price(mid, self.cfg.limits.vol_lookback);
                }
                report.mid = Some(mid);
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "quote read failed");
                self.state.note_error(now);
                report.error = Some(format!("quote: {e}"));
            }
        }

        let account = match self.exchange.account() {
            Ok(a) => {
                self.state.update_equity(a.equity_usd);
                report.equity_usd = Some(a.equity_usd);
                Some(a)
            }
            Err(e) => {
                warn!(error = %e, "account read failed");
                self.state.note_error(now);
                report.error = Some(format!("account: {e}"));
                None
            }
        };

        let equity = self.state.equity_now_usd;
        report.rolled_over = self.day.rollover_if_needed(now, equity, &mut self.state);
        if report.rolled_over {
            self.last_checkpoint = now;
            self.kill_switch_logged = false;
        }

        report.kill_switch = self.state.breach_daily_loss(self.cfg.limits.max_loss_pct_day);
        if report.kill_switch && !self.kill_switch_logged {
            warn!(
                equity_open = self.state.equity_at_open_usd,
                equity_now = self.state.equity_now_usd,
                max_loss_pct = self.cfg.limits.max_loss_pct_day,
                "daily loss kill-switch engaged; trading halted until next day"
            );
            self.kill_switch_logged = true;
        }

        let side = match intent {
            Intent::Hold => None,
            Intent::Buy => Some(Side::Buy),
            Intent::Sell => Some(Side::Sell),
        };
        if let (Some(side), Some(mid), Some(account)) = (side, report.mid, account.as_ref()) {
            let held = account.position_qty(&symbol);
            let decision = match side {
                Side::Buy => decide_buy(&self.state, &self.cfg.limits, mid, held * mid),
                Side::Sell => decide_sell(&self.state, &self.cfg.limits, mid, held),
            };

            if decision.allow {
                match self.exchange.submit_market(&symbol, side, decision.qty) {
                    Ok(order) => {
                        self.state.count_order();
                        self.track_fill(&order, mid, held);
                        report.order = Some(order);
                    }
                    Err(SubmitError::Refused(r)) => report.refusal = Some(r),
                    Err(e) => report.error = Some(e.to_string()),
                }
            } else {
                debug!(side = side.as_str(), reason = ?decision.reason_text(), "intent denied");
            }
            report.decision = Some(decision);
        }

        let interval = chrono::Duration::from_std(self.cfg.checkpoint_interval)
            .unwrap_or(chrono::Duration::zero());
        let due = report.order.is_some() || now - self.last_checkpoint >= interval;
        if due {
            report.checkpointed = self.day.persist_progress(&self.state);
            self.last_checkpoint = now;
        }

        report
    }

    fn track_fill(&mut self, order: &Order, mid: f64, held_before: f64) {
        let px = order.avg_price.unwrap_or(mid);
        match order.side {
            Side::Buy => {
                self.cost_basis = if held_before <= QTY_EPS {
                    Some(px)
                } else {
                    self.cost_basis
                        .map(|b| (b * held_before + px * order.qty) / (held_before + order.qty))
                };
            }
            Side::Sell => {
                if let Some(b) = self.cost_basis {
                    let pnl = (px - b) * order.qty;
                    self.state.record_realized_pnl(pnl);
                    debug!(pnl, realized = self.state.realized_pnl_usd, "realized pnl");
                }
                if held_before - order.qty <= QTY_EPS {
                    self.cost_basis = None;
                }
            }
        }
    }
}
