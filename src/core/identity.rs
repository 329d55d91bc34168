//! Snapshot identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid snapshot id {raw:?}: {reason}")]
pub struct InvalidSnapshotId {
    pub raw: String,
    pub reason: String,
}

/// Snapshot identifier - non-empty, journal- and path-safe.
///
/// Ids are host-assigned and immutable. The alphabet is restricted so that
/// an id can be embedded verbatim in a journal line and used as a payload
/// file name: no whitespace, control characters, `|`, or path separators.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidSnapshotId> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidSnapshotId {
                raw: s,
                reason: "empty".into(),
            });
        }
        if s == "." || s == ".." {
            return Err(InvalidSnapshotId {
                raw: s,
                reason: "reserved path component".into(),
            });
        }
        for c in s.chars() {
            if c.is_whitespace() || c.is_control() || matches!(c, '|' | '/' | '\\') {
                return Err(InvalidSnapshotId {
                    raw: s.clone(),
                    reason: format!("forbidden character {c:?}"),
                });
            }
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({:?})", self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
