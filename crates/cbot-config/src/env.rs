//! Environment overrides on top of the YAML layers.
//!
//! Variable names match the deployed `.env` files. Lookup is injected so
//! tests never touch the process environment; the CLI passes
//! `|k| std::env::var(k).ok()` after loading `.env.local`.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::info;

use crate::BotConfig;

/// Every variable `apply_env_overrides` reads.
pub const ENV_OVERRIDES: &[&str] = &[
    "SYMBOL",
    "TZ_NAME",
    "SNAPSHOT_PATH",
    "MAX_POSITION_USD",
    "MAX_LOSS_PCT_DAY",
    "RATE_LIMIT_ORDERS_PER_MIN",
    "MAX_ORDER_RETRIES",
    "RETRY_BACKOFF_MS",
    "DUP_SUPPRESS_WINDOW_MS",
    "BREAKER_THRESHOLD",
    "BREAKER_COOLDOWN_SEC",
    "BREAKER_HALFOPEN_PROBES",
];

/// Apply every set, non-empty override. Returns the names applied, in
/// `ENV_OVERRIDES` order. A value that does not parse is an error naming the
/// variable (never echoing the value).
pub fn apply_env_overrides<F>(cfg: &mut BotConfig, lookup: F) -> Result<Vec<&'static str>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    for &name in ENV_OVERRIDES {
        let raw = match lookup(name) {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => continue,
        };
        match name {
            "SYMBOL" => cfg.symbol = raw,
            "TZ_NAME" => cfg.timezone = raw,
            "SNAPSHOT_PATH" => cfg.snapshot_path = PathBuf::from(raw),
            "MAX_POSITION_USD" => cfg.risk.max_position_usd = parse(name, &raw)?,
            "MAX_LOSS_PCT_DAY" => cfg.risk.max_loss_pct_day = parse(name, &raw)?,
            "RATE_LIMIT_ORDERS_PER_MIN" => {
                cfg.execution.rate_limit_orders_per_min = parse(name, &raw)?
            }
            "MAX_ORDER_RETRIES" => cfg.execution.max_order_retries = parse(name, &raw)?,
            "RETRY_BACKOFF_MS" => cfg.execution.retry_backoff_ms = parse(name, &raw)?,
            "DUP_SUPPRESS_WINDOW_MS" => cfg.execution.dup_suppress_window_ms = parse(name, &raw)?,
            "BREAKER_THRESHOLD" => cfg.execution.breaker_threshold = parse(name, &raw)?,
            "BREAKER_COOLDOWN_SEC" => cfg.execution.breaker_cooldown_secs = parse(name, &raw)?,
            "BREAKER_HALFOPEN_PROBES" => {
                cfg.execution.breaker_half_open_probes = parse(name, &raw)?
            }
            _ => continue,
        }
        applied.push(name);
    }
    if !applied.is_empty() {
        info!(vars = ?applied, "config env overrides applied");
    }
    Ok(applied)
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("CONFIG_ENV_INVALID var={name}"))
}
