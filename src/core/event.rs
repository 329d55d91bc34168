//! Append-only log entries describing collector decisions.

use serde::{Deserialize, Serialize};

use super::identity::SnapshotId;
use super::time::WallClock;

/// Externally observable decision kinds emitted during a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcEventKind {
    DryRunTombstone,
    Tombstone,
    InactiveEligible,
    DryRunDelete,
    DeleteOk,
    DeleteFail,
    Quarantine,
}

impl GcEventKind {
    /// Wire name used in journal `EVENT` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            GcEventKind::DryRunTombstone => "DRYRUN_TOMBSTONE",
            GcEventKind::Tombstone => "TOMBSTONE",
            GcEventKind::InactiveEligible => "INACTIVE_ELIGIBLE",
            GcEventKind::DryRunDelete => "DRYRUN_DELETE",
            GcEventKind::DeleteOk => "DELETE_OK",
            GcEventKind::DeleteFail => "DELETE_FAIL",
            GcEventKind::Quarantine => "QUARANTINE",
        }
    }
}

/// One entry of the event log. Informational: events are never replayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcEvent {
    pub when: WallClock,
    pub snapshot_id: SnapshotId,
    pub kind: GcEventKind,
    pub details: String,
}

impl GcEvent {
    pub fn new(
        when: WallClock,
        snapshot_id: SnapshotId,
        kind: GcEventKind,
        details: impl Into<String>,
    ) -> Self {
        Self {
            when,
            snapshot_id,
            kind,
            details: details.into(),
        }
    }
}
