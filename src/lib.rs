#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod core;
pub mod corruption;
pub mod error;
pub mod gc;
pub mod leader;
mod paths;
pub mod storage;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the capability surface at the crate root for convenience
pub use crate::catalog::{CatalogError, JournalCatalog, SnapshotCatalog};
pub use crate::core::{
    GcEvent, GcEventKind, InvalidSnapshotId, SnapshotId, SnapshotRecord, SnapshotState, WallClock,
};
pub use crate::corruption::{CorruptionTracker, MemoryCorruptionTracker};
pub use crate::gc::{GcError, GcMetrics, GcOptions, RetentionPolicy, SnapshotGc, live_set};
pub use crate::leader::{FileLockLeader, LeaderElector};
pub use crate::storage::{BatchDeleteOutcome, FsStorage, StorageBackend, StorageError};
