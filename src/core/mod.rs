//! Core domain types, leaves-first:
//! - time: wall-clock primitives
//! - identity: SnapshotId
//! - snapshot: SnapshotState, SnapshotRecord
//! - event: GC decision log entries

pub mod event;
pub mod identity;
pub mod snapshot;
pub mod time;

pub use event::{GcEvent, GcEventKind};
pub use identity::{InvalidSnapshotId, SnapshotId};
pub use snapshot::{InvalidTag, SnapshotRecord, SnapshotState, validate_tag};
pub use time::WallClock;
