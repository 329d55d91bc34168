//! Live-set computation.
//!
//! Pure function from the current record list, the retention policy and a
//! pass instant to the set of snapshot ids that must be retained. Marking a
//! snapshot live marks its whole ancestor chain: incremental chains are
//! never truncated from below.

use std::collections::{HashMap, HashSet};

use crate::core::{SnapshotId, SnapshotRecord, SnapshotState, WallClock};

use super::policy::RetentionPolicy;

/// Operator and compliance overrides that outrank any age-based policy.
pub const PROTECTED_TAGS: [&str; 3] = ["pin", "retain", "legal"];

/// Compute the set of ids considered live for this pass.
///
/// A record is live, together with its ancestors, when any of:
/// - it is among the `keep_last_n` newest by creation time (ties broken by
///   id, ascending);
/// - it is not Deleted and younger than `max_age_ms`;
/// - it has active leases;
/// - it carries one of [`PROTECTED_TAGS`].
pub fn live_set(
    records: &[SnapshotRecord],
    policy: &RetentionPolicy,
    now: WallClock,
) -> HashSet<SnapshotId> {
    let by_id: HashMap<&SnapshotId, &SnapshotRecord> =
        records.iter().map(|rec| (&rec.id, rec)).collect();
    let mut live = HashSet::new();

    // Keep-last-N is applied uniformly over all records; later stages
    // reject terminal states on their own.
    let mut newest: Vec<&SnapshotRecord> = records.iter().collect();
    newest.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
    for rec in newest.iter().take(policy.keep_last_n) {
        mark_with_ancestors(rec, &by_id, &mut live);
    }

    let cutoff = now.saturating_sub_ms(policy.max_age_ms);
    for rec in records {
        if rec.state == SnapshotState::Deleted {
            continue;
        }
        let retained = rec.created >= cutoff
            || rec.lease_count > 0
            || PROTECTED_TAGS.iter().any(|tag| rec.has_tag(tag));
        if retained {
            mark_with_ancestors(rec, &by_id, &mut live);
        }
    }

    live
}

/// Iterative parent walk. The live set doubles as the visited set, which
/// bounds accidental cycles; dangling parents are skipped.
fn mark_with_ancestors(
    rec: &SnapshotRecord,
    by_id: &HashMap<&SnapshotId, &SnapshotRecord>,
    live: &mut HashSet<SnapshotId>,
) {
    let mut stack = vec![&rec.id];
    while let Some(id) = stack.pop() {
        if !live.insert(id.clone()) {
            continue;
        }
        if let Some(parent) = by_id.get(id).and_then(|r| r.parent_id.as_ref()) {
            if by_id.contains_key(parent) {
                stack.push(parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SnapshotId {
        SnapshotId::parse(s).unwrap()
    }

    fn rec(name: &str, created: u64) -> SnapshotRecord {
        SnapshotRecord::new(id(name), WallClock(created))
    }

    fn ids(live: &HashSet<SnapshotId>) -> Vec<&str> {
        let mut v: Vec<&str> = live.iter().map(SnapshotId::as_str).collect();
        v.sort();
        v
    }

    #[test]
    fn keep_last_n_prefers_newest_then_id() {
        let records = vec![rec("c", 100), rec("b", 200), rec("a", 200), rec("d", 50)];
        let policy = RetentionPolicy {
            keep_last_n: 3,
            max_age_ms: 0,
        };
        let live = live_set(&records, &policy, WallClock(1_000));
        // a and b tie on created; a wins the earlier slot but both fit in 3.
        assert_eq!(ids(&live), ["a", "b", "c"]);
    }

    #[test]
    fn tie_break_is_lexicographic_on_id() {
        let records = vec![rec("b", 100), rec("a", 100)];
        let policy = RetentionPolicy {
            keep_last_n: 1,
            max_age_ms: 0,
        };
        let live = live_set(&records, &policy, WallClock(1_000));
        assert_eq!(ids(&live), ["a"]);
    }

    #[test]
    fn ancestors_are_marked_transitively() {
        let mut child = rec("child", 300);
        child.parent_id = Some(id("mid"));
        let mut mid = rec("mid", 200);
        mid.parent_id = Some(id("root"));
        let root = rec("root", 100);

        let policy = RetentionPolicy {
            keep_last_n: 1,
            max_age_ms: 0,
        };
        let live = live_set(&[child, mid, root], &policy, WallClock(1_000));
        assert_eq!(ids(&live), ["child", "mid", "root"]);
    }

    #[test]
    fn dangling_parent_is_skipped() {
        let mut orphan = rec("orphan", 300);
        orphan.parent_id = Some(id("gone"));
        let policy = RetentionPolicy {
            keep_last_n: 1,
            max_age_ms: 0,
        };
        let live = live_set(&[orphan], &policy, WallClock(1_000));
        assert_eq!(ids(&live), ["orphan"]);
    }

    #[test]
    fn parent_cycle_terminates() {
        let mut a = rec("a", 300);
        a.parent_id = Some(id("b"));
        let mut b = rec("b", 200);
        b.parent_id = Some(id("a"));
        let policy = RetentionPolicy {
            keep_last_n: 1,
            max_age_ms: 0,
        };
        let live = live_set(&[a, b], &policy, WallClock(1_000));
        assert_eq!(ids(&live), ["a", "b"]);
    }

    #[test]
    fn leases_and_protected_tags_outrank_age() {
        let mut leased = rec("leased", 1);
        leased.lease_count = 1;
        let mut legal = rec("legal-hold", 1);
        legal.tags.insert("legal".to_string());
        let stale = rec("stale", 1);

        let policy = RetentionPolicy {
            keep_last_n: 0,
            max_age_ms: 0,
        };
        let live = live_set(&[leased, legal, stale], &policy, WallClock(1_000_000));
        assert_eq!(ids(&live), ["leased", "legal-hold"]);
    }

    #[test]
    fn age_window_retains_recent_records() {
        let young = rec("young", 950);
        let old = rec("old", 100);
        let policy = RetentionPolicy {
            keep_last_n: 0,
            max_age_ms: 100,
        };
        let live = live_set(&[young, old], &policy, WallClock(1_000));
        assert_eq!(ids(&live), ["young"]);
    }

    #[test]
    fn deleted_records_do_not_join_by_age_or_lease() {
        let mut gone = rec("gone", 990);
        gone.state = SnapshotState::Deleted;
        gone.lease_count = 3;
        let policy = RetentionPolicy {
            keep_last_n: 0,
            max_age_ms: 100,
        };
        let live = live_set(&[gone], &policy, WallClock(1_000));
        assert!(live.is_empty());
    }
}
