// src/transaction/marker.rs

//! On-disk dry-run session marker
//!
//! `begin`, the build and `finish` run in separate processes, so the session
//! lives in `.drydock/dry_run.json`. The marker is the only record of an
//! active session: it is created with test-and-create semantics and removed
//! by either terminal transition.
//!
//! Format: a single pretty-printed JSON object, fully written and synced to
//! a temporary file before being linked into place.

use crate::error::{Error, Result};
use crate::snapshot::SnapshotId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A dry run in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunSession {
    /// Snapshot taken by `begin`
    pub baseline: SnapshotId,

    /// When `begin` ran
    pub started_at: DateTime<Utc>,

    /// Directory `begin` was invoked from, the starting point for
    /// replaying `cd` commands from shell history
    pub working_dir: PathBuf,

    /// Empty directories present at baseline, which abort keeps
    #[serde(default)]
    pub empty_dirs: BTreeSet<String>,

    pub active: bool,
}

impl DryRunSession {
    pub fn new(baseline: SnapshotId, working_dir: PathBuf, empty_dirs: BTreeSet<String>) -> Self {
        Self {
            baseline,
            started_at: Utc::now(),
            working_dir,
            empty_dirs,
            active: true,
        }
    }
}

/// What the marker file currently says
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerState {
    /// No marker: the project is idle
    Absent,
    /// A well-formed, active session
    Active(DryRunSession),
    /// A well-formed marker whose session is no longer active
    Inactive,
    /// The marker exists but cannot be parsed
    Corrupt(String),
}

/// Atomically create the marker
///
/// Returns `false` without touching anything if a marker already exists.
pub fn create(path: &Path, session: &DryRunSession) -> Result<bool> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::IoError(format!("invalid marker path {}", path.display())))?;

    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, session)?;
    temp.write_all(b"\n")?;
    temp.as_file().sync_all()?;

    match temp.persist_noclobber(path) {
        Ok(_) => {
            debug!("Created dry-run marker {}", path.display());
            Ok(true)
        }
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            debug!("Dry-run marker {} already exists", path.display());
            Ok(false)
        }
        Err(e) => Err(e.error.into()),
    }
}

/// Read the marker
pub fn read(path: &Path) -> Result<MarkerState> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(MarkerState::Absent),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<DryRunSession>(&content) {
        Ok(session) if session.active => Ok(MarkerState::Active(session)),
        Ok(_) => Ok(MarkerState::Inactive),
        Err(e) => {
            warn!("Dry-run marker {} is unreadable: {}", path.display(), e);
            Ok(MarkerState::Corrupt(e.to_string()))
        }
    }
}

/// Remove the marker, returning whether one existed
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed dry-run marker {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> DryRunSession {
        DryRunSession::new(
            "0123456789abcdef0123456789abcdef01234567".parse().unwrap(),
            PathBuf::from("/p/src/app"),
            ["kit/empty".to_string()].into(),
        )
    }

    #[test]
    fn test_create_read_remove() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dry_run.json");

        assert_eq!(read(&path).unwrap(), MarkerState::Absent);
        assert!(create(&path, &session()).unwrap());

        match read(&path).unwrap() {
            MarkerState::Active(read_back) => assert_eq!(read_back, session_like(&read_back)),
            other => panic!("unexpected marker state {other:?}"),
        }

        assert!(remove(&path).unwrap());
        assert!(!remove(&path).unwrap());
        assert_eq!(read(&path).unwrap(), MarkerState::Absent);
    }

    fn session_like(read_back: &DryRunSession) -> DryRunSession {
        let mut expected = session();
        expected.started_at = read_back.started_at;
        expected
    }

    #[test]
    fn test_create_does_not_clobber() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dry_run.json");

        let first = session();
        assert!(create(&path, &first).unwrap());

        let mut second = session();
        second.working_dir = PathBuf::from("/elsewhere");
        assert!(!create(&path, &second).unwrap());

        match read(&path).unwrap() {
            MarkerState::Active(s) => assert_eq!(s.working_dir, PathBuf::from("/p/src/app")),
            other => panic!("unexpected marker state {other:?}"),
        }
        // No temporary files left behind
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_marker() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dry_run.json");
        fs::write(&path, "{\"baseline\": ").unwrap();

        assert!(matches!(read(&path).unwrap(), MarkerState::Corrupt(_)));
    }

    #[test]
    fn test_inactive_marker() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dry_run.json");
        let mut inactive = session();
        inactive.active = false;
        fs::write(&path, serde_json::to_string(&inactive).unwrap()).unwrap();

        assert_eq!(read(&path).unwrap(), MarkerState::Inactive);
    }

    #[test]
    fn test_marker_without_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dry_run.json");
        fs::write(
            &path,
            r#"{"baseline":"0123456789abcdef0123456789abcdef01234567","started_at":"2024-01-01T00:00:00Z","working_dir":"/p","active":true}"#,
        )
        .unwrap();

        match read(&path).unwrap() {
            MarkerState::Active(s) => assert!(s.empty_dirs.is_empty()),
            other => panic!("unexpected marker state {other:?}"),
        }
    }
}
