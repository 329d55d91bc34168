//! Retention policy and collector options.

use serde::{Deserialize, Serialize};

const DAY_MS: u64 = 24 * 60 * 60 * 1_000;

/// What must be retained regardless of reachability age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Keep this many newest snapshots (by creation time) plus their
    /// ancestor chains.
    pub keep_last_n: usize,
    /// Keep snapshots created within this window of the pass instant.
    pub max_age_ms: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_last_n: 10,
            max_age_ms: 30 * DAY_MS,
        }
    }
}

/// Knobs for a single collector pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcOptions {
    /// Record what would happen without mutating anything.
    pub dry_run: bool,
    pub enable_tombstone_stage: bool,
    pub enable_hard_delete_stage: bool,
    /// How long an unreferenced Active snapshot may sit without access
    /// before the pass emits an INACTIVE_ELIGIBLE signal.
    pub inactive_timeout_ms: u64,
    /// Minimum interval between tombstoning and payload destruction.
    pub grace_period_ms: u64,
    pub max_deletes_per_run: usize,
    pub batch_delete_size: usize,
    pub max_delete_failures_before_quarantine: u32,
    pub base_retry_backoff_ms: u64,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            enable_tombstone_stage: true,
            enable_hard_delete_stage: true,
            inactive_timeout_ms: 7 * DAY_MS,
            grace_period_ms: 7 * DAY_MS,
            max_deletes_per_run: 1_000,
            batch_delete_size: 50,
            max_delete_failures_before_quarantine: 5,
            base_retry_backoff_ms: 10_000,
        }
    }
}
