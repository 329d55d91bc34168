//! Shared builders and scripted doubles for integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Mutex;

use snapgc::{
    BatchDeleteOutcome, CorruptionTracker, LeaderElector, SnapshotId, SnapshotRecord,
    SnapshotState, StorageBackend, StorageError, WallClock,
};

pub const HOUR_MS: u64 = 60 * 60 * 1_000;
pub const DAY_MS: u64 = 24 * HOUR_MS;

pub fn id(s: &str) -> SnapshotId {
    SnapshotId::parse(s).unwrap()
}

pub fn active(name: &str, created_ms: u64) -> SnapshotRecord {
    SnapshotRecord::new(id(name), WallClock(created_ms))
}

pub fn tombstoned(name: &str, created_ms: u64, hard_delete_after_ms: u64) -> SnapshotRecord {
    let mut rec = active(name, created_ms);
    rec.state = SnapshotState::Tombstoned;
    rec.hard_delete_after = Some(WallClock(hard_delete_after_ms));
    rec
}

/// Storage double with scripted failures and call recording.
#[derive(Default)]
pub struct ScriptedStorage {
    fail_ids: BTreeSet<SnapshotId>,
    fail_error: Option<String>,
    whole_batch_error: Option<String>,
    batches: Mutex<Vec<Vec<SnapshotId>>>,
}

impl ScriptedStorage {
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Fail the given ids, attributing `error` to them.
    pub fn failing(ids: &[&str], error: &str) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| id(s)).collect(),
            fail_error: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// Whole-batch failure the backend cannot attribute to ids.
    pub fn catastrophic(error: &str) -> Self {
        Self {
            whole_batch_error: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// Every batch passed to `delete_payload_batch`, in call order.
    pub fn batches(&self) -> Vec<Vec<SnapshotId>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn was_asked_to_delete(&self, name: &str) -> bool {
        let target = id(name);
        self.batches
            .lock()
            .unwrap()
            .iter()
            .any(|batch| batch.contains(&target))
    }
}

impl StorageBackend for ScriptedStorage {
    fn delete_payload(&self, id: &SnapshotId) -> Result<(), StorageError> {
        if self.fail_ids.contains(id) {
            Err(StorageError::Backend {
                id: id.clone(),
                message: self.fail_error.clone().unwrap_or_default(),
            })
        } else {
            Ok(())
        }
    }

    fn delete_payload_batch(&self, ids: &[SnapshotId]) -> BatchDeleteOutcome {
        self.batches.lock().unwrap().push(ids.to_vec());
        if let Some(error) = &self.whole_batch_error {
            return BatchDeleteOutcome {
                ok: false,
                failed: Vec::new(),
                error: Some(error.clone()),
            };
        }
        let failed: Vec<SnapshotId> = ids
            .iter()
            .filter(|i| self.fail_ids.contains(*i))
            .cloned()
            .collect();
        BatchDeleteOutcome {
            ok: failed.is_empty(),
            error: (!failed.is_empty()).then(|| self.fail_error.clone().unwrap_or_default()),
            failed,
        }
    }

    fn exists(&self, _id: &SnapshotId) -> bool {
        false
    }
}

/// Leader double that can refuse leadership and counts releases.
pub struct FakeLeader {
    pub grants: bool,
    pub acquisitions: usize,
    pub releases: usize,
}

impl FakeLeader {
    pub fn granting() -> Self {
        Self {
            grants: true,
            acquisitions: 0,
            releases: 0,
        }
    }

    pub fn refusing() -> Self {
        Self {
            grants: false,
            acquisitions: 0,
            releases: 0,
        }
    }
}

impl LeaderElector for FakeLeader {
    fn try_acquire(&mut self) -> bool {
        if self.grants {
            self.acquisitions += 1;
        }
        self.grants
    }

    fn release(&mut self) {
        self.releases += 1;
    }
}

/// Corruption-tracker double recording forget calls.
#[derive(Default)]
pub struct RecordingTracker {
    pub forgotten: Vec<SnapshotId>,
}

impl CorruptionTracker for RecordingTracker {
    fn record_corrupt_offset(&mut self, _id: &SnapshotId, _offset: u64) {}

    fn forget_for_snapshot(&mut self, id: &SnapshotId) {
        self.forgotten.push(id.clone());
    }
}
