//! Per-session event transcripts.
//!
//! Appends one timestamped line per [`SessionEvent`] to
//! `{transcript_dir}/{session_id}.log`, so a dropped call can be replayed
//! from disk after the fact.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

use crate::session::SessionEvent;

/// Thread-safe handle to an append-only transcript file.
pub type TranscriptHandle = Arc<Mutex<Option<File>>>;

/// Current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write a timestamped line to the transcript (if present).
pub fn write_line(handle: &TranscriptHandle, label: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "[{}] {}: {}", utc_timestamp(), label, data);
            let _ = file.flush();
        }
    }
}

/// Append a session event as `event_type: {json}`.
pub fn record_event(handle: &TranscriptHandle, event: &SessionEvent) {
    match serde_json::to_string(event) {
        Ok(json) => write_line(handle, event.event_type(), &json),
        Err(e) => log::warn!("Failed to serialize session event: {}", e),
    }
}

fn open_file(dir: Option<&Path>, session_id: &str) -> Option<File> {
    let dir = dir?;
    std::fs::create_dir_all(dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}.log", session_id)))
        .map_err(|e| log::warn!("Failed to open transcript for {}: {}", session_id, e))
        .ok()
}

/// Open (or create) `{dir}/{session_id}.log` and return a shared handle.
///
/// Returns a handle to nothing when `dir` is `None` or the file can't be
/// opened; writes through it are no-ops.
pub fn open_transcript(dir: Option<&Path>, session_id: &str) -> TranscriptHandle {
    Arc::new(Mutex::new(open_file(dir, session_id)))
}

/// Point an existing handle at `{dir}/{session_id}.log`, closing the
/// previous file.
pub fn reopen_transcript(handle: &TranscriptHandle, dir: Option<&Path>, session_id: &str) {
    let file = open_file(dir, session_id);
    if let Ok(mut guard) = handle.lock() {
        *guard = file;
    }
}
