//! Day Manager: keeps `RiskState` and the on-disk snapshot aligned across
//! restarts and local-midnight boundaries.
//!
//! | Situation at startup                         | Result                              |
//! |----------------------------------------------|-------------------------------------|
//! | no snapshot / unreadable / malformed         | `Seeded`: fresh seed persisted      |
//! | snapshot for an earlier day (or bad anchor)  | `RolledOver`: fresh seed persisted  |
//! | snapshot for the current local day           | `Resumed`: counters carried forward |
//!
//! Persistence here is best-effort: failures are logged and the in-memory
//! state still proceeds. A stale or malformed snapshot is never reused.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use cbot_risk::RiskState;
use tracing::{error, info, warn};

use crate::snapshot::format_day_open;
use crate::{DaySnapshot, SnapshotLock, SnapshotStore, TradingCalendar};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupKind {
    Seeded,
    RolledOver,
    Resumed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Startup {
    pub kind: StartupKind,
    /// The snapshot now in effect (and, unless the write failed, on disk).
    pub snapshot: DaySnapshot,
}

#[derive(Clone, Debug)]
pub struct DayManager {
    calendar: TradingCalendar,
    store: SnapshotStore,
}

impl DayManager {
    pub fn new(calendar: TradingCalendar, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            calendar,
            store: SnapshotStore::new(snapshot_path),
        }
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Claim the snapshot path for this process. Hold the guard for as long
    /// as this manager writes.
    pub fn lock(&self) -> Result<SnapshotLock> {
        SnapshotLock::acquire(self.store.path())
    }

    /// Load or seed today's snapshot and initialize `st` from it.
    pub fn init_at_startup(&self, now: DateTime<Utc>, equity_now: f64, st: &mut RiskState) -> Startup {
        let today_open = self.calendar.day_open(now);
        let seed = DaySnapshot::seed_for_today(&self.calendar, now, equity_now);

        let snap = match self.store.load() {
            Ok(snap) => snap,
            Err(e) => {
                info!(tz = self.calendar.name(), reason = %e, "no usable snapshot; seeding today");
                self.save_logged(&seed, "seed");
                st.reset_day(seed.equity_at_open_usd, today_open);
                return Startup {
                    kind: StartupKind::Seeded,
                    snapshot: seed,
                };
            }
        };

        let current = match snap.day_open() {
            Ok(prev_open) => self.calendar.same_trading_day(prev_open, now),
            Err(e) => {
                warn!(error = %e, "snapshot day anchor unparsable; discarding");
                false
            }
        };

        if !current {
            info!(
                tz = self.calendar.name(),
                previous = %snap.day_open_iso,
                "snapshot is from an earlier day; rolled to today"
            );
            self.save_logged(&seed, "rollover");
            st.reset_day(seed.equity_at_open_usd, today_open);
            return Startup {
                kind: StartupKind::RolledOver,
                snapshot: seed,
            };
        }

        st.reset_day(snap.equity_at_open_usd, today_open);
        st.orders_today = snap.orders_today;
        st.realized_pnl_usd = snap.realized_pnl_usd;
        info!(
            tz = self.calendar.name(),
            orders_today = snap.orders_today,
            equity_open = snap.equity_at_open_usd,
            "resumed snapshot for today"
        );
        Startup {
            kind: StartupKind::Resumed,
            snapshot: snap,
        }
    }

    /// Call once per tick. On a day boundary, persists a fresh seed with
    /// `equity_now` as the new open equity, resets `st`, and returns true.
    pub fn rollover_if_needed(&self, now: DateTime<Utc>, equity_now: f64, st: &mut RiskState) -> bool {
        if self.calendar.same_trading_day(st.day_open, now) {
            return false;
        }

        let seed = DaySnapshot::seed_for_today(&self.calendar, now, equity_now);
        self.save_logged(&seed, "rollover");
        st.reset_day(equity_now, self.calendar.day_open(now));
        info!(equity_open = equity_now, day_open = %seed.day_open_iso, "new trading day started");
        true
    }

    /// Best-effort checkpoint of the current day's progress. Returns whether
    /// the write succeeded; a failure is logged and otherwise ignored.
    pub fn persist_progress(&self, st: &RiskState) -> bool {
        let snap = self.snapshot_of(st);
        match self.store.save(&snap) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "progress checkpoint failed");
                false
            }
        }
    }

    /// Durable projection of `st`'s day-scoped fields.
    pub fn snapshot_of(&self, st: &RiskState) -> DaySnapshot {
        DaySnapshot {
            day_open_iso: format_day_open(st.day_open),
            timezone: self.calendar.name().to_string(),
            equity_at_open_usd: st.equity_at_open_usd,
            orders_today: st.orders_today,
            realized_pnl_usd: st.realized_pnl_usd,
        }
    }

    fn save_logged(&self, snap: &DaySnapshot, what: &str) {
        if let Err(e) = self.store.save(snap) {
            error!(what, path = %self.store.path().display(), error = %format!("{e:#}"), "saving snapshot failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn rollover_is_noop_within_day() {
        let dir = tempfile::tempdir().unwrap();
        let dm = DayManager::new(TradingCalendar::utc(), dir.path().join("day.json"));
        let mut st = RiskState::new(1_000.0, Duration::ZERO, at(2026, 3, 2, 0));
        st.count_order();

        assert!(!dm.rollover_if_needed(at(2026, 3, 2, 23), 900.0, &mut st));
        assert_eq!(st.orders_today, 1);
        assert_eq!(st.equity_at_open_usd, 1_000.0);
        assert!(!dm.store().path().exists());
    }

    #[test]
    fn rollover_resets_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let dm = DayManager::new(TradingCalendar::utc(), dir.path().join("day.json"));
        let mut st = RiskState::new(1_000.0, Duration::ZERO, at(2026, 3, 2, 0));
        st.count_order();
        st.record_realized_pnl(-20.0);

        assert!(dm.rollover_if_needed(at(2026, 3, 3, 0), 980.0, &mut st));
        assert_eq!(st.orders_today, 0);
        assert_eq!(st.realized_pnl_usd, 0.0);
        assert_eq!(st.equity_at_open_usd, 980.0);
        assert_eq!(st.day_open, at(2026, 3, 3, 0));

        let on_disk = dm.store().load().unwrap();
        assert_eq!(on_disk.day_open_iso, "2026-03-03T00:00:00Z");
        assert_eq!(on_disk.equity_at_open_usd, 980.0);
    }

    #[test]
    fn rollover_survives_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let dm = DayManager::new(TradingCalendar::utc(), dir.path().join("missing").join("day.json"));
        let mut st = RiskState::new(1_000.0, Duration::ZERO, at(2026, 3, 2, 0));

        assert!(dm.rollover_if_needed(at(2026, 3, 3, 1), 990.0, &mut st));
        assert_eq!(st.equity_at_open_usd, 990.0);
        assert!(!dm.persist_progress(&st));
    }
}
