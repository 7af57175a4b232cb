//! Single-writer guard for a snapshot path.
//!
//! An exclusive create of `<snapshot>.lock` marks the path as owned by this
//! process. The file holds the owner's pid and is removed when the guard
//! drops. A lock left behind by a killed process must be removed by hand.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct SnapshotLock {
    path: PathBuf,
}

impl SnapshotLock {
    /// Take the lock for `snapshot_path`. Fails if another holder exists.
    pub fn acquire(snapshot_path: &Path) -> Result<Self> {
        let path = lock_path(snapshot_path);
        let mut file = match create_exclusive(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                bail!(
                    "SNAPSHOT_LOCKED path={} holder_pid={}; remove the lock file if that process is gone",
                    path.display(),
                    holder.trim()
                );
            }
            Err(e) => {
                return Err(e).with_context(|| format!("create snapshot lock {}", path.display()))
            }
        };
        // The pid is informational only; the lock is the file's existence.
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            warn!(path = %path.display(), error = %e, "could not record pid in snapshot lock");
        }
        debug!(path = %path.display(), "snapshot lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "snapshot lock not removed");
        }
    }
}

fn lock_path(snapshot_path: &Path) -> PathBuf {
    let mut s = snapshot_path.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

#[cfg(unix)]
fn create_exclusive(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn create_exclusive(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}
