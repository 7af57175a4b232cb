//! Snapshot durability scenarios:
//! - save then load is field-for-field identical
//! - a failure after the temp write but before the rename leaves no partial
//!   file and no temp file, and the existing snapshot stays loadable
//! - a write into a missing directory fails without creating anything
//! - the `.bak` sibling carries the last written content

use std::fs;
use std::path::Path;

use cbot_day::{load_snapshot, save_snapshot, write_file_atomic, DaySnapshot, SnapshotStore};

fn snap(orders: u32) -> DaySnapshot {
    DaySnapshot {
        day_open_iso: "2026-03-02T05:00:00Z".to_string(),
        timezone: "America/New_York".to_string(),
        equity_at_open_usd: 10_000.5,
        orders_today: orders,
        realized_pnl_usd: -12.25,
    }
}

#[test]
fn scenario_round_trip_is_field_for_field_equal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("day.json");

    save_snapshot(&path, &snap(3)).unwrap();
    let loaded = load_snapshot(&path).unwrap();

    assert_eq!(loaded, snap(3));
}

fn stray_temp_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".tmp-"))
        .collect()
}

#[test]
fn scenario_failed_rename_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("day.json"));
    store.save(&snap(1)).unwrap();

    // The temp file is written and synced, then the rename onto a non-empty
    // directory fails: the window between temp write and rename.
    let occupied = dir.path().join("occupied");
    fs::create_dir(&occupied).unwrap();
    fs::write(occupied.join("keep.txt"), b"keep").unwrap();

    let err = save_snapshot(&occupied, &snap(9)).unwrap_err();
    assert!(format!("{err:#}").contains("write snapshot failed"), "{err:#}");

    assert!(stray_temp_files(dir.path()).is_empty(), "temp file must not survive");
    assert_eq!(fs::read(occupied.join("keep.txt")).unwrap(), b"keep");
    assert_eq!(store.load().unwrap(), snap(1));
}

#[test]
fn scenario_failed_write_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("day.json");

    assert!(save_snapshot(&path, &snap(1)).is_err());
    assert!(!path.exists());
    assert!(!dir.path().join("missing").exists(), "the store never creates directories");
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn scenario_backup_holds_last_written_copy() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("day.json"));

    store.save(&snap(1)).unwrap();
    store.save(&snap(2)).unwrap();

    let bak: DaySnapshot = serde_json::from_slice(&fs::read(store.backup_path()).unwrap()).unwrap();
    assert_eq!(bak, snap(2));
}

#[test]
fn scenario_load_errors_are_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("day.json");

    assert!(load_snapshot(&path).is_err(), "missing file must error");

    write_file_atomic(&path, b"not json").unwrap();
    assert!(load_snapshot(&path).is_err(), "malformed file must error");

    write_file_atomic(&path, br#"{"day_open_iso":"x"}"#).unwrap();
    assert!(load_snapshot(&path).is_err(), "missing fields must error");
}
