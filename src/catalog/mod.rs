//! Snapshot catalog: durable id -> record mapping plus an event log.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::{GcEvent, InvalidSnapshotId, InvalidTag, SnapshotId, SnapshotRecord, SnapshotState};

pub mod codec;
pub mod journal;

pub use journal::JournalCatalog;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("journal corrupt at {path:?} line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error(transparent)]
    InvalidId(#[from] InvalidSnapshotId),
    #[error("record {id} carries {source}")]
    InvalidTag {
        id: SnapshotId,
        #[source]
        source: InvalidTag,
    },
}

/// Durable, crash-safe mapping from snapshot id to record.
///
/// The catalog exclusively owns record state; collectors only read records
/// and issue these operations. `transition_state` is the sole primitive by
/// which state advances - every destructive step is gated on it.
pub trait SnapshotCatalog {
    /// Point-in-time snapshot of the mapping; order unspecified.
    fn list_all(&self) -> CatalogResult<Vec<SnapshotRecord>>;

    fn get(&self, id: &SnapshotId) -> CatalogResult<Option<SnapshotRecord>>;

    /// Optimistic compare-and-swap on `state`.
    ///
    /// Persists and returns `Ok(true)` only when the record exists and its
    /// current state equals `expected`; `Ok(false)` leaves the record
    /// unchanged. A mismatch is expected contention, never an error.
    fn transition_state(
        &self,
        id: &SnapshotId,
        expected: SnapshotState,
        desired: SnapshotState,
    ) -> CatalogResult<bool>;

    /// Replace the full record keyed by `record.id`, creating it if absent.
    /// Durable before returning success.
    fn upsert(&self, record: &SnapshotRecord) -> CatalogResult<bool>;

    /// Append to the event log. Need not be synchronous, but events must
    /// survive a clean shutdown.
    fn record_event(&self, event: &GcEvent) -> CatalogResult<()>;
}
