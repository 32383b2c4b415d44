//! Session snapshot and its stored JSON form
//!
//! The stored record is camelCase JSON:
//!
//! ```json
//! {
//!   "sessionId": "…",
//!   "savedAt": 1735689600000,
//!   "lines": [{ "id": 3, "type": "input", "content": "> help", "timestamp": 1735689600000 }],
//!   "history": ["help"],
//!   "inputDraft": "",
//!   "scrollOffset": 0
//! }
//! ```
//!
//! Decoding is lenient: anything malformed inside the record is dropped
//! field by field. Only a payload that is not a JSON object at all counts
//! as invalid.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;
use crate::terminal::{LineContent, LineKind, TerminalLine};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub lines: Vec<TerminalLine>,
    pub history: Vec<String>,
    pub input_draft: String,
    pub scroll_offset: usize,
}

impl SessionSnapshot {
    /// Nothing worth persisting
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.history.is_empty()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredLine<'a> {
    id: u64,
    #[serde(rename = "type")]
    kind: LineKind,
    content: &'a str,
    timestamp: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession<'a> {
    session_id: &'a str,
    saved_at: i64,
    lines: Vec<StoredLine<'a>>,
    history: &'a [String],
    input_draft: &'a str,
    scroll_offset: usize,
}

/// Serialize a snapshot. Widget and branding lines are not persisted.
pub(crate) fn encode(
    snapshot: &SessionSnapshot,
    session_id: &str,
    saved_at: DateTime<Utc>,
) -> Result<String> {
    let lines = snapshot
        .lines
        .iter()
        .filter(|l| l.kind != LineKind::Branding)
        .filter_map(|l| {
            Some(StoredLine {
                id: l.id,
                kind: l.kind,
                content: l.text()?,
                timestamp: l.created_at.timestamp_millis(),
            })
        })
        .collect();

    let record = StoredSession {
        session_id,
        saved_at: saved_at.timestamp_millis(),
        lines,
        history: &snapshot.history,
        input_draft: &snapshot.input_draft,
        scroll_offset: snapshot.scroll_offset,
    };
    Ok(serde_json::to_string(&record)?)
}

#[derive(Debug, PartialEq)]
pub(crate) enum Decoded {
    Restored {
        snapshot: SessionSnapshot,
        session_id: Option<String>,
    },
    Expired,
    Invalid,
}

pub(crate) fn decode(
    payload: &str,
    now: DateTime<Utc>,
    max_age: Duration,
    history_cap: usize,
) -> Decoded {
    let record = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => map,
        _ => return Decoded::Invalid,
    };

    if let Some(saved_at) = record.get("savedAt").and_then(Value::as_i64) {
        let age_ms = now.timestamp_millis().saturating_sub(saved_at);
        if age_ms > max_age.as_millis() as i64 {
            return Decoded::Expired;
        }
    }

    let lines = record
        .get("lines")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().filter_map(|v| decode_line(v, now)).collect())
        .unwrap_or_default();

    let history: Vec<String> = record
        .get("history")
        .and_then(Value::as_array)
        .map(|h| {
            h.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let skip = history.len().saturating_sub(history_cap);
    let history = history.into_iter().skip(skip).collect();

    let snapshot = SessionSnapshot {
        lines,
        history,
        input_draft: record
            .get("inputDraft")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        scroll_offset: record
            .get("scrollOffset")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
    };

    Decoded::Restored {
        snapshot,
        session_id: record
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn decode_line(value: &Value, now: DateTime<Utc>) -> Option<TerminalLine> {
    let id = value.get("id")?.as_u64()?;
    let kind = LineKind::parse(value.get("type")?.as_str()?)?;
    if kind == LineKind::Branding {
        return None;
    }
    let content = value.get("content")?.as_str()?.to_string();
    let created_at = value
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(now);

    Some(TerminalLine {
        id,
        kind,
        content: LineContent::Text(content),
        created_at,
    })
}
