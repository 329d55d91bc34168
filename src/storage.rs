//! Payload storage backend.
//!
//! The collector never reads payloads; it only requests deletion. Deletion
//! must be idempotent: an absent payload is a success, so a crash between
//! payload removal and the catalog transition is safe to retry.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::SnapshotId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error deleting payload {id} at {path:?}: {source}")]
    Io {
        id: SnapshotId,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("backend error for payload {id}: {message}")]
    Backend { id: SnapshotId, message: String },
}

/// Outcome of a batch payload deletion.
///
/// `failed` lists per-id failures. A backend that cannot attribute an error
/// to individual ids reports `ok == false` with `failed` empty and a
/// non-empty `error`; callers must then treat the whole batch as failed.
#[derive(Debug, Clone)]
pub struct BatchDeleteOutcome {
    pub ok: bool,
    pub failed: Vec<SnapshotId>,
    pub error: Option<String>,
}

impl BatchDeleteOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            failed: Vec::new(),
            error: None,
        }
    }

    /// True when the backend could not attribute the failure to ids and the
    /// whole batch must be considered failed.
    pub fn is_catastrophic(&self) -> bool {
        !self.ok && self.failed.is_empty() && self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

pub trait StorageBackend {
    /// Delete one payload. Absent payload returns `Ok(())`.
    fn delete_payload(&self, id: &SnapshotId) -> Result<(), StorageError>;

    /// Batch deletion. The default implementation loops single deletes and
    /// reports per-id failures, so it is never catastrophic.
    fn delete_payload_batch(&self, ids: &[SnapshotId]) -> BatchDeleteOutcome {
        let mut failed = Vec::new();
        let mut error = None;
        for id in ids {
            if let Err(e) = self.delete_payload(id) {
                failed.push(id.clone());
                error = Some(e.to_string());
            }
        }
        BatchDeleteOutcome {
            ok: failed.is_empty(),
            failed,
            error,
        }
    }

    /// Not consulted during a pass; serving paths use it.
    fn exists(&self, id: &SnapshotId) -> bool;
}

/// Filesystem payloads: one file or directory per snapshot id under a root.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn payload_path(&self, id: &SnapshotId) -> PathBuf {
        // Ids reject path separators and dot components at parse time.
        self.root.join(id.as_str())
    }
}

impl StorageBackend for FsStorage {
    fn delete_payload(&self, id: &SnapshotId) -> Result<(), StorageError> {
        let path = self.payload_path(id);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StorageError::Io {
                    id: id.clone(),
                    path,
                    source,
                });
            }
        };

        let result = if meta.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                id: id.clone(),
                path,
                source,
            }),
        }
    }

    fn exists(&self, id: &SnapshotId) -> bool {
        self.payload_path(id).exists()
    }
}
