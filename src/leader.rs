//! Single-collector coordination across processes.
//!
//! Best-effort exclusion: every destructive step is additionally gated by a
//! state CAS, so a rare transient overlap is tolerated - two collectors
//! racing on the same candidate see exactly one CAS win.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::WallClock;

pub trait LeaderElector {
    /// Attempt to become the single collector. Returns false when another
    /// process holds leadership.
    fn try_acquire(&mut self) -> bool;

    /// Idempotent; dropping an elector also releases.
    fn release(&mut self);
}

/// Metadata written into the lock file so operators can see who holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderLockMeta {
    pub pid: u32,
    pub acquired_at_ms: u64,
    pub version: String,
}

impl LeaderLockMeta {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at_ms: WallClock::now().0,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Leader election via an exclusively created lock file.
///
/// `try_acquire` creates the file with create-new semantics and fails if it
/// already exists; `release` (and Drop) removes it.
pub struct FileLockLeader {
    path: PathBuf,
    acquired: bool,
}

impl FileLockLeader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            acquired: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    fn acquire_inner(&self) -> io::Result<File> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        if let Ok(meta) = fs::symlink_metadata(&self.path) {
            if meta.file_type().is_symlink() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "lock path is a symlink",
                ));
            }
        }
        OpenOptions::new().write(true).create_new(true).open(&self.path)
    }
}

impl LeaderElector for FileLockLeader {
    fn try_acquire(&mut self) -> bool {
        if self.acquired {
            return true;
        }
        let mut file = match self.acquire_inner() {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "leader lock held elsewhere");
                return false;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "leader lock acquisition failed");
                return false;
            }
        };

        let meta = LeaderLockMeta::current();
        let written = serde_json::to_vec(&meta)
            .map_err(io::Error::other)
            .and_then(|bytes| file.write_all(&bytes))
            .and_then(|()| file.sync_all());
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "failed to write leader lock metadata");
            let _ = fs::remove_file(&self.path);
            return false;
        }

        self.acquired = true;
        true
    }

    fn release(&mut self) {
        if !self.acquired {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove leader lock");
        }
        self.acquired = false;
    }
}

impl Drop for FileLockLeader {
    fn drop(&mut self) {
        self.release();
    }
}

/// Read the holder metadata from an existing lock file, if any.
pub fn read_leader_meta(path: &Path) -> io::Result<Option<LeaderLockMeta>> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(io::Error::other),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
