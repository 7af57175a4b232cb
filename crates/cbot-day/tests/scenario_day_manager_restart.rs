//! Day Manager startup and rollover across process restarts.

use std::time::Duration;

use cbot_day::{DayManager, DaySnapshot, StartupKind, TradingCalendar};
use cbot_risk::RiskState;
use chrono::{DateTime, TimeZone, Utc};

const TZ: &str = "America/New_York";

fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

fn blank_state() -> RiskState {
    RiskState::new(0.0, Duration::from_secs(30), Utc.timestamp_opt(0, 0).unwrap())
}

#[test]
fn scenario_first_boot_seeds_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let dm = DayManager::new(TradingCalendar::new(TZ), dir.path().join("day.json"));
    let mut st = blank_state();

    let now = utc(2026, 3, 2, 15, 0);
    let out = dm.init_at_startup(now, 10_000.0, &mut st);

    assert_eq!(out.kind, StartupKind::Seeded);
    assert_eq!(out.snapshot.equity_at_open_usd, 10_000.0);
    assert_eq!(st.day_open, utc(2026, 3, 2, 5, 0));
    assert_eq!(st.equity_at_open_usd, 10_000.0);
    assert_eq!(dm.store().load().unwrap(), out.snapshot);
}

#[test]
fn scenario_same_day_restart_carries_progress_forward() {
    let dir = tempfile::tempdir().unwrap();
    let dm = DayManager::new(TradingCalendar::new(TZ), dir.path().join("day.json"));

    // First process: seed, trade, checkpoint.
    let mut st = blank_state();
    dm.init_at_startup(utc(2026, 3, 2, 14, 0), 10_000.0, &mut st);
    st.count_order();
    st.count_order();
    st.record_realized_pnl(-35.5);
    st.update_equity(9_964.5);
    assert!(dm.persist_progress(&st));

    // Second process, later the same local day, with different live equity.
    let mut restarted = blank_state();
    let out = dm.init_at_startup(utc(2026, 3, 2, 20, 0), 9_900.0, &mut restarted);

    assert_eq!(out.kind, StartupKind::Resumed);
    assert_eq!(restarted.orders_today, 2);
    assert_eq!(restarted.realized_pnl_usd, -35.5);
    // The kill-switch baseline is the persisted open equity, not the restart equity.
    assert_eq!(restarted.equity_at_open_usd, 10_000.0);
    assert_eq!(restarted.day_open, utc(2026, 3, 2, 5, 0));
}

#[test]
fn scenario_yesterday_snapshot_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let cal = TradingCalendar::new(TZ);
    let dm = DayManager::new(cal.clone(), dir.path().join("day.json"));

    let yesterday = DaySnapshot {
        day_open_iso: "2026-03-01T05:00:00Z".to_string(),
        timezone: TZ.to_string(),
        equity_at_open_usd: 12_000.0,
        orders_today: 17,
        realized_pnl_usd: 250.0,
    };
    dm.store().save(&yesterday).unwrap();

    // 04:30 UTC on Mar 2 is still Mar 1 in New York: same day, resume.
    let mut st = blank_state();
    let out = dm.init_at_startup(utc(2026, 3, 2, 4, 30), 11_000.0, &mut st);
    assert_eq!(out.kind, StartupKind::Resumed);
    assert_eq!(st.orders_today, 17);

    // After local midnight: rolled.
    let now = utc(2026, 3, 2, 5, 30);
    let mut st = blank_state();
    let out = dm.init_at_startup(now, 11_000.0, &mut st);
    assert_eq!(out.kind, StartupKind::RolledOver);
    assert_eq!(st.day_open, cal.day_open(now));
    assert_eq!(st.day_open, utc(2026, 3, 2, 5, 0));
    assert_eq!(st.orders_today, 0);
    assert_eq!(st.realized_pnl_usd, 0.0);
    assert_eq!(st.equity_at_open_usd, 11_000.0);

    let on_disk = dm.store().load().unwrap();
    assert_eq!(on_disk.day_open_iso, "2026-03-02T05:00:00Z");
    assert_eq!(on_disk.orders_today, 0);
}

#[test]
fn scenario_malformed_or_unanchored_snapshot_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("day.json");
    let dm = DayManager::new(TradingCalendar::utc(), &path);
    let now = utc(2026, 3, 2, 12, 0);

    std::fs::write(&path, b"{ not json").unwrap();
    let mut st = blank_state();
    let out = dm.init_at_startup(now, 500.0, &mut st);
    assert_eq!(out.kind, StartupKind::Seeded);
    assert_eq!(dm.store().load().unwrap().equity_at_open_usd, 500.0);

    let bad_anchor = DaySnapshot {
        day_open_iso: "not-a-time".to_string(),
        timezone: "UTC".to_string(),
        equity_at_open_usd: 1.0,
        orders_today: 4,
        realized_pnl_usd: 0.0,
    };
    dm.store().save(&bad_anchor).unwrap();
    let mut st = blank_state();
    let out = dm.init_at_startup(now, 600.0, &mut st);
    assert_eq!(out.kind, StartupKind::RolledOver);
    assert_eq!(st.orders_today, 0);
    assert_eq!(st.equity_at_open_usd, 600.0);
}

#[test]
fn scenario_checkpoint_keeps_current_day_anchor_after_midnight() {
    let dir = tempfile::tempdir().unwrap();
    let dm = DayManager::new(TradingCalendar::utc(), dir.path().join("day.json"));
    let mut st = blank_state();
    dm.init_at_startup(utc(2026, 3, 2, 23, 0), 1_000.0, &mut st);
    st.count_order();

    // A checkpoint taken before the tick that rolls over keeps yesterday's anchor.
    assert!(dm.persist_progress(&st));
    let snap = dm.store().load().unwrap();
    assert_eq!(snap.day_open_iso, "2026-03-02T00:00:00Z");
    assert_eq!(snap.orders_today, 1);

    assert!(dm.rollover_if_needed(utc(2026, 3, 3, 0, 1), 1_010.0, &mut st));
    assert_eq!(dm.store().load().unwrap().day_open_iso, "2026-03-03T00:00:00Z");
}
