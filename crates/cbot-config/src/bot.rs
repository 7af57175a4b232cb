use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use cbot_execution::SafetyConfig;
use cbot_risk::Limits;
use serde::{Deserialize, Serialize};

/// JSON pointers read by `BotConfig`. Anything else in the merged tree is
/// reported by `unused_leaf_pointers`.
pub(crate) const CONSUMED_POINTERS: &[&str] = &[
    "/symbol",
    "/timezone",
    "/snapshot_path",
    "/checkpoint_interval_secs",
    "/risk/max_position_usd",
    "/risk/max_order_notional_usd",
    "/risk/max_orders_per_day",
    "/risk/max_loss_pct_day",
    "/risk/vol_sizing_on",
    "/risk/vol_lookback",
    "/risk/target_risk_bp",
    "/risk/error_cooldown_secs",
    "/execution/rate_limit_orders_per_min",
    "/execution/max_order_retries",
    "/execution/retry_backoff_ms",
    "/execution/dup_suppress_window_ms",
    "/execution/breaker_threshold",
    "/execution/breaker_cooldown_secs",
    "/execution/breaker_half_open_probes",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Traded instrument, BASE-QUOTE (e.g. `BTC-USD`).
    pub symbol: String,
    /// IANA zone that defines the trading day. Unknown names fall back to UTC.
    pub timezone: String,
    pub snapshot_path: PathBuf,
    pub checkpoint_interval_secs: u64,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USD".to_string(),
            timezone: "UTC".to_string(),
            snapshot_path: PathBuf::from("state/day_snapshot.json"),
            checkpoint_interval_secs: 60,
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_position_usd: f64,
    pub max_order_notional_usd: f64,
    pub max_orders_per_day: u32,
    pub max_loss_pct_day: f64,
    pub vol_sizing_on: bool,
    pub vol_lookback: usize,
    pub target_risk_bp: f64,
    pub error_cooldown_secs: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let l = Limits::sane_defaults();
        Self {
            max_position_usd: l.max_position_usd,
            max_order_notional_usd: l.max_order_notional_usd,
            max_orders_per_day: l.max_orders_per_day,
            max_loss_pct_day: l.max_loss_pct_day,
            vol_sizing_on: l.vol_sizing_on,
            vol_lookback: l.vol_lookback,
            target_risk_bp: l.target_risk_bp,
            error_cooldown_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub rate_limit_orders_per_min: u32,
    pub max_order_retries: u32,
    pub retry_backoff_ms: u64,
    pub dup_suppress_window_ms: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub breaker_half_open_probes: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let s = SafetyConfig::default();
        Self {
            rate_limit_orders_per_min: s.rate_limit_orders_per_min,
            max_order_retries: s.max_order_retries,
            retry_backoff_ms: s.retry_backoff.as_millis() as u64,
            dup_suppress_window_ms: s.dup_suppress_window.as_millis() as u64,
            breaker_threshold: s.breaker_threshold,
            breaker_cooldown_secs: s.breaker_cooldown.as_secs(),
            breaker_half_open_probes: s.breaker_half_open_probes,
        }
    }
}

impl BotConfig {
    /// Breaker threshold below 1 becomes 3; half-open probes below 1 become 1;
    /// symbol and timezone are trimmed; an empty timezone becomes UTC.
    pub fn normalize(&mut self) {
        self.symbol = self.symbol.trim().to_string();
        self.timezone = self.timezone.trim().to_string();
        if self.timezone.is_empty() {
            self.timezone = "UTC".to_string();
        }
        if self.execution.breaker_threshold < 1 {
            self.execution.breaker_threshold = 3;
        }
        if self.execution.breaker_half_open_probes < 1 {
            self.execution.breaker_half_open_probes = 1;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() {
            bail!("CONFIG_INVALID symbol is empty");
        }
        if !self.symbol.contains('-') {
            bail!(
                "CONFIG_INVALID symbol={} is not BASE-QUOTE (e.g. BTC-USD)",
                self.symbol
            );
        }

        let r = &self.risk;
        for (name, v) in [
            ("risk.max_position_usd", r.max_position_usd),
            ("risk.max_order_notional_usd", r.max_order_notional_usd),
            ("risk.max_loss_pct_day", r.max_loss_pct_day),
            ("risk.target_risk_bp", r.target_risk_bp),
        ] {
            if !v.is_finite() || v < 0.0 {
                bail!("CONFIG_INVALID {name}={v} must be finite and >= 0");
            }
        }
        if r.vol_sizing_on && r.vol_lookback < 2 {
            bail!(
                "CONFIG_INVALID risk.vol_lookback={} must be >= 2 when vol sizing is on",
                r.vol_lookback
            );
        }
        if self.snapshot_path.as_os_str().is_empty() {
            bail!("CONFIG_INVALID snapshot_path is empty");
        }
        Ok(())
    }

    pub fn to_limits(&self) -> Limits {
        let r = &self.risk;
        Limits {
            max_position_usd: r.max_position_usd,
            max_order_notional_usd: r.max_order_notional_usd,
            max_orders_per_day: r.max_orders_per_day,
            max_loss_pct_day: r.max_loss_pct_day,
            vol_sizing_on: r.vol_sizing_on,
            vol_lookback: r.vol_lookback,
            target_risk_bp: r.target_risk_bp,
        }
    }

    pub fn safety_config(&self) -> SafetyConfig {
        let e = &self.execution;
        SafetyConfig {
            rate_limit_orders_per_min: e.rate_limit_orders_per_min,
            max_order_retries: e.max_order_retries,
            retry_backoff: Duration::from_millis(e.retry_backoff_ms),
            dup_suppress_window: Duration::from_millis(e.dup_suppress_window_ms),
            breaker_threshold: e.breaker_threshold,
            breaker_cooldown: Duration::from_secs(e.breaker_cooldown_secs),
            breaker_half_open_probes: e.breaker_half_open_probes,
        }
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.risk.error_cooldown_secs)
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs)
    }
}
