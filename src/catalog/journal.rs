//! Journal-backed catalog.
//!
//! The catalog is an in-memory map rebuilt on startup by replaying an
//! append-only journal. Each state transition and upsert is flushed and
//! fsynced before the call returns; events are appended without fsync.
//!
//! Replay rules: `UPSERT` overwrites by id, `STATE` applies the desired
//! state unconditionally when the record exists (replay trusts history;
//! CAS semantics apply only to live calls), `EVENT` lines are skipped.
//! A final line without a newline is a crash artifact: it is discarded and
//! the file truncated back to the last record boundary.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::core::{GcEvent, SnapshotId, SnapshotRecord, SnapshotState, validate_tag};

use super::codec::{self, EVENT_PREFIX, STATE_PREFIX, UPSERT_PREFIX};
use super::{CatalogError, CatalogResult, SnapshotCatalog};

pub struct JournalCatalog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    records: BTreeMap<SnapshotId, SnapshotRecord>,
    /// Events recorded during this process's lifetime. Replay never
    /// reconstructs events; this is observability for hosts and tests.
    session_events: Vec<GcEvent>,
}

impl JournalCatalog {
    /// Open (creating if absent) the journal at `path` and replay it.
    pub fn open(path: impl Into<PathBuf>) -> CatalogResult<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| CatalogError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;

        let records = replay(&path, &file)?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                records,
                session_events: Vec::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Events appended since this catalog was opened, in append order.
    pub fn session_events(&self) -> Vec<GcEvent> {
        self.lock().session_events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn io_err(&self, source: std::io::Error) -> CatalogError {
        CatalogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Append one line and fsync. Used for upsert and state transitions;
    /// the map must only be updated after this succeeds.
    fn append_durable(&self, inner: &mut Inner, line: &str) -> CatalogResult<()> {
        inner
            .file
            .write_all(format!("{line}\n").as_bytes())
            .map_err(|e| self.io_err(e))?;
        inner.file.sync_data().map_err(|e| self.io_err(e))
    }

    /// Append one line without fsync. Survives clean shutdown only.
    fn append_relaxed(&self, inner: &mut Inner, line: &str) -> CatalogResult<()> {
        inner
            .file
            .write_all(format!("{line}\n").as_bytes())
            .map_err(|e| self.io_err(e))
    }
}

impl SnapshotCatalog for JournalCatalog {
    fn list_all(&self) -> CatalogResult<Vec<SnapshotRecord>> {
        Ok(self.lock().records.values().cloned().collect())
    }

    fn get(&self, id: &SnapshotId) -> CatalogResult<Option<SnapshotRecord>> {
        Ok(self.lock().records.get(id).cloned())
    }

    fn transition_state(
        &self,
        id: &SnapshotId,
        expected: SnapshotState,
        desired: SnapshotState,
    ) -> CatalogResult<bool> {
        let mut inner = self.lock();
        match inner.records.get(id) {
            Some(rec) if rec.state == expected => {}
            _ => return Ok(false),
        }
        self.append_durable(&mut inner, &codec::encode_state(id, expected, desired))?;
        if let Some(rec) = inner.records.get_mut(id) {
            rec.state = desired;
        }
        Ok(true)
    }

    fn upsert(&self, record: &SnapshotRecord) -> CatalogResult<bool> {
        for tag in &record.tags {
            validate_tag(tag).map_err(|source| CatalogError::InvalidTag {
                id: record.id.clone(),
                source,
            })?;
        }
        let mut inner = self.lock();
        self.append_durable(&mut inner, &codec::encode_record(record))?;
        inner.records.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    fn record_event(&self, event: &GcEvent) -> CatalogResult<()> {
        let mut inner = self.lock();
        self.append_relaxed(&mut inner, &codec::encode_event(event))?;
        inner.session_events.push(event.clone());
        Ok(())
    }
}

fn replay(path: &Path, file: &File) -> CatalogResult<BTreeMap<SnapshotId, SnapshotRecord>> {
    let bytes = fs::read(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // A crash can leave a partially written final line. Records are atomic
    // at line boundaries, so everything past the last newline is discarded
    // and the file truncated to match.
    let valid_len = match bytes.iter().rposition(|&b| b == b'\n') {
        Some(pos) => pos + 1,
        None => 0,
    };
    if valid_len < bytes.len() {
        tracing::warn!(
            path = %path.display(),
            discarded_bytes = bytes.len() - valid_len,
            "discarding partial trailing journal record"
        );
        file.set_len(valid_len as u64)
            .map_err(|source| CatalogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let text = std::str::from_utf8(&bytes[..valid_len]).map_err(|e| CatalogError::Corrupt {
        path: path.to_path_buf(),
        line: 0,
        reason: format!("journal is not utf-8: {e}"),
    })?;

    let corrupt = |line: usize, reason: String| CatalogError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut records = BTreeMap::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if let Some(payload) = line.strip_prefix(UPSERT_PREFIX) {
            let rec = codec::decode_record(payload).map_err(|reason| corrupt(line_no, reason))?;
            records.insert(rec.id.clone(), rec);
        } else if let Some(payload) = line.strip_prefix(STATE_PREFIX) {
            let (id, _expected, desired) =
                codec::decode_state(payload).map_err(|reason| corrupt(line_no, reason))?;
            if let Some(rec) = records.get_mut(&id) {
                rec.state = desired;
            }
        } else if line.strip_prefix(EVENT_PREFIX).is_some() {
            // Events are informational; nothing to reconstruct.
        } else {
            return Err(corrupt(line_no, format!("unknown record prefix: {line:?}")));
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GcEventKind, WallClock};

    fn id(s: &str) -> SnapshotId {
        SnapshotId::parse(s).unwrap()
    }

    fn open_in(dir: &Path) -> JournalCatalog {
        JournalCatalog::open(dir.join("catalog.log")).unwrap()
    }

    #[test]
    fn cas_applies_only_on_expected_state() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = open_in(dir.path());
        catalog
            .upsert(&SnapshotRecord::new(id("a"), WallClock(1)))
            .unwrap();

        assert!(
            catalog
                .transition_state(&id("a"), SnapshotState::Active, SnapshotState::Tombstoned)
                .unwrap()
        );
        // Already Tombstoned: the same transition no longer applies.
        assert!(
            !catalog
                .transition_state(&id("a"), SnapshotState::Active, SnapshotState::Tombstoned)
                .unwrap()
        );
        // Missing record.
        assert!(
            !catalog
                .transition_state(&id("nope"), SnapshotState::Active, SnapshotState::Deleted)
                .unwrap()
        );
        assert_eq!(
            catalog.get(&id("a")).unwrap().unwrap().state,
            SnapshotState::Tombstoned
        );
    }

    #[test]
    fn failed_cas_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.log");
        let catalog = JournalCatalog::open(&path).unwrap();
        catalog
            .upsert(&SnapshotRecord::new(id("a"), WallClock(1)))
            .unwrap();
        let before = fs::metadata(&path).unwrap().len();

        assert!(
            !catalog
                .transition_state(&id("a"), SnapshotState::Deleting, SnapshotState::Deleted)
                .unwrap()
        );
        assert_eq!(fs::metadata(&path).unwrap().len(), before);
    }

    #[test]
    fn upsert_rejects_journal_unsafe_tags() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = open_in(dir.path());
        let mut rec = SnapshotRecord::new(id("a"), WallClock(1));
        rec.tags.insert("has space".to_string());
        assert!(matches!(
            catalog.upsert(&rec),
            Err(CatalogError::InvalidTag { .. })
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn session_events_are_retained_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = open_in(dir.path());
        for (n, kind) in [GcEventKind::Tombstone, GcEventKind::DeleteOk].iter().enumerate() {
            catalog
                .record_event(&GcEvent::new(
                    WallClock(n as u64),
                    id("a"),
                    *kind,
                    "detail",
                ))
                .unwrap();
        }
        let events = catalog.session_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, GcEventKind::Tombstone);
        assert_eq!(events[1].kind, GcEventKind::DeleteOk);
    }

    #[test]
    fn unknown_prefix_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.log");
        fs::write(&path, "GARBAGE line\n").unwrap();
        assert!(matches!(
            JournalCatalog::open(&path),
            Err(CatalogError::Corrupt { line: 1, .. })
        ));
    }
}
