//! Snapshot metadata record and its lifecycle states.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::identity::SnapshotId;
use super::time::WallClock;

/// Lifecycle of a snapshot as seen by the collector.
///
/// The integer codes are stable: they are what the journal's `STATE` records
/// carry, so reordering variants would corrupt existing journals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SnapshotState {
    Active,
    /// Soft-deleted: reads should fail, payload may still exist.
    Tombstoned,
    /// Payload destruction claimed by a collector, in progress.
    Deleting,
    /// Payload gone. Terminal.
    Deleted,
    /// Repeated delete failures; operator attention required. Terminal
    /// as far as the collector is concerned.
    Quarantined,
}

impl SnapshotState {
    pub fn code(self) -> u8 {
        match self {
            SnapshotState::Active => 0,
            SnapshotState::Tombstoned => 1,
            SnapshotState::Deleting => 2,
            SnapshotState::Deleted => 3,
            SnapshotState::Quarantined => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SnapshotState::Active),
            1 => Some(SnapshotState::Tombstoned),
            2 => Some(SnapshotState::Deleting),
            3 => Some(SnapshotState::Deleted),
            4 => Some(SnapshotState::Quarantined),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotState::Active => "active",
            SnapshotState::Tombstoned => "tombstoned",
            SnapshotState::Deleting => "deleting",
            SnapshotState::Deleted => "deleted",
            SnapshotState::Quarantined => "quarantined",
        }
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tag {tag:?}: {reason}")]
pub struct InvalidTag {
    pub tag: String,
    pub reason: String,
}

/// Tags ride in a comma-joined journal field, so the alphabet is restricted
/// the same way snapshot ids are, plus the comma itself.
pub fn validate_tag(tag: &str) -> Result<(), InvalidTag> {
    if tag.is_empty() {
        return Err(InvalidTag {
            tag: tag.to_string(),
            reason: "empty".into(),
        });
    }
    for c in tag.chars() {
        if c.is_whitespace() || c.is_control() || matches!(c, '|' | ',') {
            return Err(InvalidTag {
                tag: tag.to_string(),
                reason: format!("forbidden character {c:?}"),
            });
        }
    }
    Ok(())
}

/// One snapshot known to the catalog.
///
/// `id` and `created` are immutable after first insert. `hard_delete_after`
/// is stamped once, at tombstone time, and never modified afterwards so
/// later policy changes cannot retroactively shorten a grace window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: SnapshotId,
    pub created: WallClock,
    pub size_bytes: u64,
    pub state: SnapshotState,
    /// Predecessor in an incremental chain.
    pub parent_id: Option<SnapshotId>,
    pub tags: BTreeSet<String>,
    /// Active readers; a positive count forbids destruction.
    pub lease_count: u32,
    /// Zero if never accessed.
    pub last_access: WallClock,
    pub hard_delete_after: Option<WallClock>,
    /// Consecutive payload-deletion failures since the last success.
    pub delete_failures: u32,
    pub next_retry_after: Option<WallClock>,
    pub last_error: String,
}

impl SnapshotRecord {
    pub fn new(id: SnapshotId, created: WallClock) -> Self {
        Self {
            id,
            created,
            size_bytes: 0,
            state: SnapshotState::Active,
            parent_id: None,
            tags: BTreeSet::new(),
            lease_count: 0,
            last_access: WallClock(0),
            hard_delete_after: None,
            delete_failures: 0,
            next_retry_after: None,
            last_error: String::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
