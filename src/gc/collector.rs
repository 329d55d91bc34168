//! The collector: one synchronous, idempotent pass of the two-stage state
//! machine.
//!
//! Stage A tombstones Active snapshots outside the live set. Stage B claims
//! tombstoned snapshots whose grace window expired, deletes their payloads
//! in batches, and on failure reverts them for retry with exponential
//! backoff - or quarantines them after too many consecutive failures.
//!
//! Every destructive step is gated by an optimistic state CAS, so two
//! collectors racing on the same candidate see exactly one win; a failed
//! CAS is never fatal.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, SnapshotCatalog};
use crate::core::{GcEvent, GcEventKind, SnapshotId, SnapshotRecord, SnapshotState, WallClock};
use crate::corruption::CorruptionTracker;
use crate::leader::LeaderElector;
use crate::storage::StorageBackend;

use super::liveness;
use super::policy::{GcOptions, RetentionPolicy};

/// Per-pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcMetrics {
    pub scanned: u64,
    pub tombstoned: u64,
    pub deleted: u64,
    pub quarantined: u64,
    pub delete_failed: u64,
    pub inactive_loaded_signals: u64,
}

#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One collector over injected capabilities. Borrowed references only; the
/// collector holds no state across passes beyond its configuration.
pub struct SnapshotGc<'a> {
    catalog: &'a dyn SnapshotCatalog,
    storage: &'a dyn StorageBackend,
    policy: RetentionPolicy,
    opts: GcOptions,
    leader: Option<&'a mut dyn LeaderElector>,
    corruption: Option<&'a mut dyn CorruptionTracker>,
}

impl<'a> SnapshotGc<'a> {
    pub fn new(
        catalog: &'a dyn SnapshotCatalog,
        storage: &'a dyn StorageBackend,
        policy: RetentionPolicy,
        opts: GcOptions,
    ) -> Self {
        Self {
            catalog,
            storage,
            policy,
            opts,
            leader: None,
            corruption: None,
        }
    }

    pub fn with_leader(mut self, leader: &'a mut dyn LeaderElector) -> Self {
        self.leader = Some(leader);
        self
    }

    pub fn with_corruption(mut self, tracker: &'a mut dyn CorruptionTracker) -> Self {
        self.corruption = Some(tracker);
        self
    }

    /// Run one pass at the current wall clock.
    pub fn run_once(&mut self) -> Result<GcMetrics, GcError> {
        self.run_once_at(WallClock::now())
    }

    /// Run one pass at an explicit instant. Hosts that manage their own
    /// clock (and tests) drive this directly.
    pub fn run_once_at(&mut self, now: WallClock) -> Result<GcMetrics, GcError> {
        if let Some(leader) = self.leader.as_deref_mut() {
            if !leader.try_acquire() {
                debug!("leader held elsewhere; skipping pass");
                return Ok(GcMetrics::default());
            }
        }

        let result = self.run_pass(now);

        // Released unconditionally, pass failed or not.
        if let Some(leader) = self.leader.as_deref_mut() {
            leader.release();
        }
        result
    }

    fn run_pass(&mut self, now: WallClock) -> Result<GcMetrics, GcError> {
        let all = self.catalog.list_all()?;
        let mut metrics = GcMetrics {
            scanned: all.len() as u64,
            ..GcMetrics::default()
        };

        let live = liveness::live_set(&all, &self.policy, now);
        debug!(
            scanned = all.len(),
            live = live.len(),
            dry_run = self.opts.dry_run,
            "computed live set"
        );

        if self.opts.enable_tombstone_stage {
            self.tombstone_stage(&all, &live, now, &mut metrics)?;
        }
        if self.opts.enable_hard_delete_stage {
            self.hard_delete_stage(now, &mut metrics)?;
        }

        info!(
            scanned = metrics.scanned,
            tombstoned = metrics.tombstoned,
            deleted = metrics.deleted,
            quarantined = metrics.quarantined,
            delete_failed = metrics.delete_failed,
            inactive_signals = metrics.inactive_loaded_signals,
            "gc pass complete"
        );
        Ok(metrics)
    }

    fn tombstone_stage(
        &mut self,
        all: &[SnapshotRecord],
        live: &HashSet<SnapshotId>,
        now: WallClock,
        metrics: &mut GcMetrics,
    ) -> Result<(), GcError> {
        for rec in all {
            if rec.state != SnapshotState::Active
                || live.contains(&rec.id)
                || rec.lease_count > 0
            {
                continue;
            }

            if self.opts.dry_run {
                self.catalog.record_event(&GcEvent::new(
                    now,
                    rec.id.clone(),
                    GcEventKind::DryRunTombstone,
                    "would tombstone",
                ))?;
                continue;
            }

            if !self.catalog.transition_state(
                &rec.id,
                SnapshotState::Active,
                SnapshotState::Tombstoned,
            )? {
                // Another actor moved the record since listing.
                continue;
            }
            let Some(mut cur) = self.catalog.get(&rec.id)? else {
                continue;
            };
            // hard_delete_after is stamped exactly once so later policy
            // changes cannot shorten an already-running grace window.
            if cur.hard_delete_after.is_none() {
                cur.hard_delete_after = Some(now.saturating_add_ms(self.opts.grace_period_ms));
            }
            cur.next_retry_after = None;
            cur.last_error.clear();
            self.catalog.upsert(&cur)?;
            self.catalog.record_event(&GcEvent::new(
                now,
                rec.id.clone(),
                GcEventKind::Tombstone,
                "soft-deleted; payload destruction scheduled",
            ))?;
            metrics.tombstoned += 1;
            debug!(id = %rec.id, "tombstoned");
        }

        // Signal only: unreferenced Active snapshots whose last observed
        // access is older than the inactive timeout. Never-accessed
        // records (last_access zero) are left out, and a dry run emits
        // nothing but DRYRUN_* events.
        if self.opts.dry_run {
            return Ok(());
        }
        for rec in all {
            if rec.state != SnapshotState::Active || live.contains(&rec.id) {
                continue;
            }
            if rec.last_access.is_never() {
                continue;
            }
            if now >= rec.last_access.saturating_add_ms(self.opts.inactive_timeout_ms) {
                self.catalog.record_event(&GcEvent::new(
                    now,
                    rec.id.clone(),
                    GcEventKind::InactiveEligible,
                    "unreferenced past inactive timeout",
                ))?;
                metrics.inactive_loaded_signals += 1;
            }
        }

        Ok(())
    }

    fn hard_delete_stage(&mut self, now: WallClock, metrics: &mut GcMetrics) -> Result<(), GcError> {
        // Re-list: the tombstone stage may have changed the catalog.
        let all = self.catalog.list_all()?;
        let mut eligible: Vec<&SnapshotRecord> = all
            .iter()
            .filter(|rec| {
                rec.state == SnapshotState::Tombstoned
                    && rec.lease_count == 0
                    && rec.hard_delete_after.is_some_and(|after| now >= after)
                    && rec.next_retry_after.is_none_or(|after| now >= after)
            })
            .collect();
        eligible.truncate(self.opts.max_deletes_per_run);

        for chunk in eligible.chunks(self.opts.batch_delete_size.max(1)) {
            if self.opts.dry_run {
                for rec in chunk {
                    self.catalog.record_event(&GcEvent::new(
                        now,
                        rec.id.clone(),
                        GcEventKind::DryRunDelete,
                        "would hard-delete payload",
                    ))?;
                }
                continue;
            }

            // Claim each candidate first; a lost CAS means another actor
            // owns it and it is dropped from this batch silently.
            let mut deleting: Vec<SnapshotId> = Vec::with_capacity(chunk.len());
            for rec in chunk {
                if self.catalog.transition_state(
                    &rec.id,
                    SnapshotState::Tombstoned,
                    SnapshotState::Deleting,
                )? {
                    deleting.push(rec.id.clone());
                }
            }
            if deleting.is_empty() {
                continue;
            }

            let outcome = self.storage.delete_payload_batch(&deleting);
            let whole_batch_failed = outcome.is_catastrophic();

            for id in &deleting {
                let failed = whole_batch_failed || outcome.failed.contains(id);
                if failed {
                    self.record_delete_failure(
                        id,
                        outcome.error.as_deref().unwrap_or(""),
                        now,
                        metrics,
                    )?;
                } else {
                    self.finish_delete(id, now, metrics)?;
                }
            }
        }

        Ok(())
    }

    fn finish_delete(
        &mut self,
        id: &SnapshotId,
        now: WallClock,
        metrics: &mut GcMetrics,
    ) -> Result<(), GcError> {
        let _ = self
            .catalog
            .transition_state(id, SnapshotState::Deleting, SnapshotState::Deleted)?;
        // A success ends any failure streak.
        if let Some(mut cur) = self.catalog.get(id)? {
            if cur.delete_failures != 0 || cur.next_retry_after.is_some() || !cur.last_error.is_empty()
            {
                cur.delete_failures = 0;
                cur.next_retry_after = None;
                cur.last_error.clear();
                self.catalog.upsert(&cur)?;
            }
        }
        self.catalog.record_event(&GcEvent::new(
            now,
            id.clone(),
            GcEventKind::DeleteOk,
            "payload permanently deleted",
        ))?;
        metrics.deleted += 1;
        debug!(id = %id, "payload deleted");
        if let Some(tracker) = self.corruption.as_deref_mut() {
            tracker.forget_for_snapshot(id);
        }
        Ok(())
    }

    fn record_delete_failure(
        &mut self,
        id: &SnapshotId,
        err: &str,
        now: WallClock,
        metrics: &mut GcMetrics,
    ) -> Result<(), GcError> {
        metrics.delete_failed += 1;
        let Some(mut cur) = self.catalog.get(id)? else {
            return Ok(());
        };

        cur.delete_failures = cur.delete_failures.saturating_add(1);
        cur.last_error = if err.is_empty() {
            "Delete failed".to_string()
        } else {
            err.to_string()
        };
        let backoff_ms = self
            .opts
            .base_retry_backoff_ms
            .saturating_mul(1u64 << cur.delete_failures.min(10));
        cur.next_retry_after = Some(now.saturating_add_ms(backoff_ms));

        let quarantine = cur.delete_failures >= self.opts.max_delete_failures_before_quarantine;
        let desired = if quarantine {
            SnapshotState::Quarantined
        } else {
            SnapshotState::Tombstoned
        };
        if !self
            .catalog
            .transition_state(id, SnapshotState::Deleting, desired)?
        {
            // Another actor claimed the record; its bookkeeping is not ours
            // to write anymore.
            return Ok(());
        }
        cur.state = desired;
        self.catalog.upsert(&cur)?;

        if quarantine {
            self.catalog.record_event(&GcEvent::new(
                now,
                id.clone(),
                GcEventKind::Quarantine,
                format!("too many delete failures: {}", cur.last_error),
            ))?;
            metrics.quarantined += 1;
            warn!(id = %id, failures = cur.delete_failures, "quarantined after repeated delete failures");
        } else {
            self.catalog.record_event(&GcEvent::new(
                now,
                id.clone(),
                GcEventKind::DeleteFail,
                format!("will retry after backoff: {}", cur.last_error),
            ))?;
            warn!(id = %id, failures = cur.delete_failures, error = %cur.last_error, "payload delete failed");
        }
        Ok(())
    }
}
