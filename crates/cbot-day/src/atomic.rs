//! Crash-safe whole-file replacement.
//!
//! A reader never observes a partially written target: the rename is the only
//! visible state transition. On any early exit the temp file is removed and
//! the existing target is left untouched.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Write `data` to `path` atomically:
/// temp file in the same directory, fsync, close, rename over `path`, then
/// best-effort fsync of the directory so the rename itself is durable.
pub fn write_file_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);

    let mut tmp = tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    // Closes the handle; the path is still deleted on drop until persisted.
    let tmp_path = tmp.into_temp_path();
    tmp_path.persist(path).map_err(|e| e.error)?;

    sync_dir(dir);
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(d) = File::open(dir) {
        let _ = d.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
