// src/generate/history.rs

//! Shell history capture
//!
//! Bash writes `#<epoch>` lines before each command when `HISTTIMEFORMAT`
//! is set. Without them the session is located by the last `drydock
//! dry-run` invocation instead.

use crate::error::Result;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(\d+)$").expect("valid timestamp regex"));

static DRY_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*drydock\s+(\S+\s+)*dry-run(\s|$)").expect("valid dry-run regex"));

/// One command from the history file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub command: String,
}

/// Parse bash history text
pub fn parse_history(text: &str) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    let mut pending = None;

    for line in text.lines() {
        if let Some(caps) = TIMESTAMP.captures(line.trim_end()) {
            pending = caps[1]
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        entries.push(HistoryEntry {
            timestamp: pending.take(),
            command: line.to_string(),
        });
    }

    entries
}

/// Read and parse a history file; a missing file yields no entries
pub fn read_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    match fs::read(path) {
        Ok(bytes) => {
            let entries = parse_history(&String::from_utf8_lossy(&bytes));
            debug!("{} history entries in {}", entries.len(), path.display());
            Ok(entries)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("History file {} does not exist", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Entries belonging to the session that started at `started_at`
///
/// Timestamped entries are selected by time, `[started_at, now)` at
/// second resolution. Untimed histories fall back to the entries after the
/// last `drydock dry-run`.
pub fn select_session<'a>(
    entries: &'a [HistoryEntry],
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<&'a HistoryEntry> {
    if entries.iter().any(|e| e.timestamp.is_some()) {
        let from = started_at
            .duration_trunc(TimeDelta::seconds(1))
            .unwrap_or(started_at);
        return entries
            .iter()
            .filter(|e| e.timestamp.is_some_and(|t| t >= from && t < now))
            .collect();
    }

    match entries.iter().rposition(|e| DRY_RUN.is_match(&e.command)) {
        Some(start) => entries[start + 1..].iter().collect(),
        None => {
            warn!("History has no timestamps and no dry-run invocation");
            Vec::new()
        }
    }
}
