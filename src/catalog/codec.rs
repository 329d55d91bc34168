//! Journal line codec.
//!
//! Three newline-terminated record kinds with human-readable prefixes:
//!
//! ```text
//! UPSERT id|created_ms|size|state|parent|tags|lease|last_access_ms|hard_delete_ms|failures|next_retry_ms|last_error
//! STATE <id> <expected_code> <desired_code>
//! EVENT <id> <KIND> <escaped-details>
//! ```
//!
//! Optional instants encode as millisecond epoch or `-1`. `parent` may be
//! empty, `tags` is a comma-joined sorted list. `last_error` is the trailing
//! field and the only one that may contain arbitrary text; `\n`, `\r` and
//! `\\` are escaped so a record always occupies exactly one line.

use std::collections::BTreeSet;

use crate::core::{GcEvent, SnapshotId, SnapshotRecord, SnapshotState, WallClock};

pub const UPSERT_PREFIX: &str = "UPSERT ";
pub const STATE_PREFIX: &str = "STATE ";
pub const EVENT_PREFIX: &str = "EVENT ";

const RECORD_FIELDS: usize = 12;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}

pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn encode_opt(t: Option<WallClock>) -> String {
    match t {
        Some(WallClock(ms)) => ms.to_string(),
        None => "-1".to_string(),
    }
}

fn decode_opt(field: &str) -> Result<Option<WallClock>, String> {
    if field == "-1" {
        return Ok(None);
    }
    field
        .parse::<u64>()
        .map(|ms| Some(WallClock(ms)))
        .map_err(|e| format!("bad instant {field:?}: {e}"))
}

pub fn encode_record(rec: &SnapshotRecord) -> String {
    let parent = rec.parent_id.as_ref().map(SnapshotId::as_str).unwrap_or("");
    let tags = rec.tags.iter().cloned().collect::<Vec<_>>().join(",");
    format!(
        "{UPSERT_PREFIX}{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        rec.id,
        rec.created.0,
        rec.size_bytes,
        rec.state.code(),
        parent,
        tags,
        rec.lease_count,
        rec.last_access.0,
        encode_opt(rec.hard_delete_after),
        rec.delete_failures,
        encode_opt(rec.next_retry_after),
        escape(&rec.last_error),
    )
}

/// Decode the payload of an `UPSERT` line (prefix already stripped).
pub fn decode_record(payload: &str) -> Result<SnapshotRecord, String> {
    let fields: Vec<&str> = payload.splitn(RECORD_FIELDS, '|').collect();
    if fields.len() != RECORD_FIELDS {
        return Err(format!(
            "expected {RECORD_FIELDS} fields, got {}",
            fields.len()
        ));
    }

    let id = SnapshotId::parse(fields[0]).map_err(|e| e.to_string())?;
    let created = WallClock(
        fields[1]
            .parse()
            .map_err(|e| format!("bad created {:?}: {e}", fields[1]))?,
    );
    let size_bytes = fields[2]
        .parse()
        .map_err(|e| format!("bad size {:?}: {e}", fields[2]))?;
    let state_code: u8 = fields[3]
        .parse()
        .map_err(|e| format!("bad state {:?}: {e}", fields[3]))?;
    let state = SnapshotState::from_code(state_code)
        .ok_or_else(|| format!("unknown state code {state_code}"))?;
    let parent_id = if fields[4].is_empty() {
        None
    } else {
        Some(SnapshotId::parse(fields[4]).map_err(|e| e.to_string())?)
    };
    let tags: BTreeSet<String> = if fields[5].is_empty() {
        BTreeSet::new()
    } else {
        fields[5].split(',').map(str::to_string).collect()
    };
    let lease_count = fields[6]
        .parse()
        .map_err(|e| format!("bad lease count {:?}: {e}", fields[6]))?;
    let last_access = WallClock(
        fields[7]
            .parse()
            .map_err(|e| format!("bad last_access {:?}: {e}", fields[7]))?,
    );
    let hard_delete_after = decode_opt(fields[8])?;
    let delete_failures = fields[9]
        .parse()
        .map_err(|e| format!("bad failure count {:?}: {e}", fields[9]))?;
    let next_retry_after = decode_opt(fields[10])?;
    let last_error = unescape(fields[11]);

    Ok(SnapshotRecord {
        id,
        created,
        size_bytes,
        state,
        parent_id,
        tags,
        lease_count,
        last_access,
        hard_delete_after,
        delete_failures,
        next_retry_after,
        last_error,
    })
}

pub fn encode_state(id: &SnapshotId, expected: SnapshotState, desired: SnapshotState) -> String {
    format!(
        "{STATE_PREFIX}{id} {} {}",
        expected.code(),
        desired.code()
    )
}

/// Decode the payload of a `STATE` line (prefix already stripped).
pub fn decode_state(payload: &str) -> Result<(SnapshotId, SnapshotState, SnapshotState), String> {
    let mut parts = payload.split(' ');
    let id = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or("missing id")?;
    let expected = parts.next().ok_or("missing expected state")?;
    let desired = parts.next().ok_or("missing desired state")?;
    if parts.next().is_some() {
        return Err("trailing fields".into());
    }

    let id = SnapshotId::parse(id).map_err(|e| e.to_string())?;
    let expected: u8 = expected
        .parse()
        .map_err(|e| format!("bad expected state: {e}"))?;
    let desired: u8 = desired
        .parse()
        .map_err(|e| format!("bad desired state: {e}"))?;
    let expected = SnapshotState::from_code(expected)
        .ok_or_else(|| format!("unknown state code {expected}"))?;
    let desired = SnapshotState::from_code(desired)
        .ok_or_else(|| format!("unknown state code {desired}"))?;
    Ok((id, expected, desired))
}

pub fn encode_event(event: &GcEvent) -> String {
    format!(
        "{EVENT_PREFIX}{} {} {}",
        event.snapshot_id,
        event.kind.as_str(),
        escape(&event.details),
    )
}
