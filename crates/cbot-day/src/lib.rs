//! cbot-day
//!
//! Trading-day boundaries and crash-safe persistence of day-scoped risk state.
//!
//! - [`TradingCalendar`]: local midnight in a configured timezone
//! - [`write_file_atomic`]: temp file + fsync + rename + best-effort dir fsync
//! - [`DaySnapshot`] / [`SnapshotStore`]: the durable unit of crash recovery
//! - [`DayManager`]: startup seed/resume and per-tick rollover of `RiskState`
//! - [`SnapshotLock`]: one writer per snapshot path

mod atomic;
mod calendar;
mod lock;
mod manager;
mod snapshot;

pub use atomic::write_file_atomic;
pub use calendar::TradingCalendar;
pub use lock::SnapshotLock;
pub use manager::{DayManager, Startup, StartupKind};
pub use snapshot::{load_snapshot, save_snapshot, DaySnapshot, SnapshotStore};
