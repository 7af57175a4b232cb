//! Command handler modules for the `cbot` CLI.
//!
//! Shared utilities used by multiple command paths live here.

pub mod paper;
pub mod snapshot;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cbot_config::{
    apply_env_overrides, effective_config_hash, load_layered_yaml, unused_leaf_pointers, BotConfig,
    LoadedConfig,
};
use cbot_day::TradingCalendar;
use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Layers + process env overrides, normalized and validated.
pub fn load_bot_config(paths: &[PathBuf]) -> Result<(BotConfig, LoadedConfig)> {
    let loaded = load_layered_yaml(paths)?;
    warn_unused_keys(&loaded);

    let mut cfg = loaded.bot_config()?;
    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok())?;
    cfg.normalize();
    cfg.validate()?;
    Ok((cfg, loaded))
}

fn warn_unused_keys(loaded: &LoadedConfig) {
    let unused = unused_leaf_pointers(&loaded.config_json);
    if unused.is_empty() {
        return;
    }
    eprintln!("WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}", unused.len());
    for p in unused.iter().take(50) {
        eprintln!("  unused={}", p);
    }
    let extra = unused.len().saturating_sub(50);
    if extra > 0 {
        eprintln!("  ... and {} more", extra);
    }
}

/// Snapshot writes do not create directories; the operator surface does.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create snapshot dir failed: {}", parent.display()))?;
    }
    Ok(())
}

pub fn parse_instant(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        None => Ok(Utc::now()),
        Some(s) => Ok(DateTime::parse_from_rfc3339(s.trim())
            .with_context(|| format!("--at must be RFC 3339, got '{s}'"))?
            .with_timezone(&Utc)),
    }
}

// ---------------------------------------------------------------------------
// config-hash
// ---------------------------------------------------------------------------

pub fn config_hash(paths: &[PathBuf]) -> Result<()> {
    let (cfg, loaded) = load_bot_config(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("effective_config_hash={}", effective_config_hash(&cfg)?);
    println!("{}", loaded.canonical_json);
    Ok(())
}

// ---------------------------------------------------------------------------
// day-open
// ---------------------------------------------------------------------------

pub fn day_open(tz: &str, at: Option<&str>) -> Result<()> {
    let now = parse_instant(at)?;
    let cal = TradingCalendar::new(tz);
    let open = cal.day_open(now);
    let next = cal.next_open(now);
    println!("tz={}", cal.tz().name());
    println!("at={}", now.to_rfc3339());
    println!("day_open={}", open.to_rfc3339());
    println!("next_open={}", next.to_rfc3339());
    println!("seconds_to_rollover={}", (next - now).num_seconds());
    Ok(())
}
