//! `cbot snapshot show | seed`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use cbot_day::{DaySnapshot, SnapshotLock, SnapshotStore, TradingCalendar};
use chrono::Utc;

pub fn show(path: &Path) -> Result<()> {
    let store = SnapshotStore::new(path);
    let snap = store.load()?;
    let cal = TradingCalendar::new(&snap.timezone);
    let now = Utc::now();

    let current = match snap.day_open() {
        Ok(open) => cal.same_trading_day(open, now),
        Err(_) => false,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&snap).context("serialize snapshot failed")?
    );
    println!("current_day={}", current);
    if store.backup_path().exists() {
        println!("backup={}", store.backup_path().display());
    }
    Ok(())
}

pub fn seed(path: &Path, tz: &str, equity: f64, force: bool) -> Result<()> {
    if !equity.is_finite() || equity <= 0.0 {
        bail!("--equity must be a positive number, got {equity}");
    }
    let store = SnapshotStore::new(path);
    if path.exists() && !force {
        bail!(
            "REFUSING SEED: {} already exists. Re-run with --force to replace it.",
            path.display()
        );
    }

    super::ensure_parent_dir(path)?;
    let _lock = SnapshotLock::acquire(path)?;
    let cal = TradingCalendar::new(tz);
    let snap = DaySnapshot::seed_for_today(&cal, Utc::now(), equity);
    store.save(&snap)?;

    println!("seeded={}", path.display());
    println!("day_open={}", snap.day_open_iso);
    println!("timezone={}", snap.timezone);
    Ok(())
}
