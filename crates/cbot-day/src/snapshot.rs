//! Day snapshot: the durable projection of `RiskState`'s day-scoped fields.
//!
//! One JSON record per installation. A sibling `<path>.bak` holds an
//! unsynchronized copy of the last written content.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{write_file_atomic, TradingCalendar};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DaySnapshot {
    /// Trading day anchor (local midnight), RFC 3339 in UTC.
    pub day_open_iso: String,
    pub timezone: String,

    /// Equity at start of day; the kill-switch baseline.
    pub equity_at_open_usd: f64,

    pub orders_today: u32,
    pub realized_pnl_usd: f64,
}

impl DaySnapshot {
    /// Fresh snapshot for the trading day containing `now`.
    pub fn seed_for_today(cal: &TradingCalendar, now: DateTime<Utc>, equity_at_open_usd: f64) -> Self {
        Self {
            day_open_iso: format_day_open(cal.day_open(now)),
            timezone: cal.name().to_string(),
            equity_at_open_usd,
            orders_today: 0,
            realized_pnl_usd: 0.0,
        }
    }

    pub fn day_open(&self) -> Result<DateTime<Utc>> {
        parse_day_open(&self.day_open_iso)
    }
}

pub(crate) fn format_day_open(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_day_open(s: &str) -> Result<DateTime<Utc>> {
    if s.is_empty() {
        bail!("empty day_open_iso");
    }
    let t = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad day_open_iso: {s}"))?;
    Ok(t.with_timezone(&Utc))
}

/// Serialize, write the best-effort `.bak`, then atomically replace `path`.
pub fn save_snapshot(path: &Path, snap: &DaySnapshot) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(snap).context("serialize snapshot failed")?;

    let bak = backup_path(path);
    if let Err(e) = fs::write(&bak, &bytes) {
        debug!(path = %bak.display(), error = %e, "snapshot backup write failed");
    }

    write_file_atomic(path, &bytes)
        .with_context(|| format!("write snapshot failed: {}", path.display()))
}

/// Read and parse `path`. Missing, unreadable and malformed files all error;
/// the caller decides whether to seed.
pub fn load_snapshot(path: &Path) -> Result<DaySnapshot> {
    let raw = fs::read(path).with_context(|| format!("read snapshot failed: {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parse snapshot failed: {}", path.display()))
}

fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".bak");
    PathBuf::from(os)
}

/// Snapshot persistence bound to one configured path.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        backup_path(&self.path)
    }

    pub fn save(&self, snap: &DaySnapshot) -> Result<()> {
        save_snapshot(&self.path, snap)
    }

    pub fn load(&self) -> Result<DaySnapshot> {
        load_snapshot(&self.path)
    }
}
