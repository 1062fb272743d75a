// src/transaction/mod.rs

//! Dry-run transactions over the project tree
//!
//! A dry run brackets an uncontrolled build:
//!
//! ```text
//! Idle --begin--> DryRunning --finish--> Idle   (changes kept)
//!                            --abort---> Idle   (tree reverted to baseline)
//! ```
//!
//! `begin` snapshots the tree and records the baseline in the session marker.
//! Generators read the marker to find the baseline and diff against it.
//! `finish` never snapshots; the changes in the working tree are the
//! deliverable. Both terminal transitions remove the marker, even when
//! reverting fails part way.
//!
//! Each step is crash-safe on its own: a crash before the marker is linked
//! leaves the project idle (with at most an extra snapshot in history), and a
//! crash after leaves a session that a later `finish` resolves.

pub mod marker;

pub use marker::{DryRunSession, MarkerState};

use crate::error::{Error, Result};
use crate::filesystem;
use crate::project::Project;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Session state as seen by the command layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DryRunState {
    Idle,
    DryRunning(DryRunSession),
    /// A marker exists but cannot be read; counts as running
    Corrupt(String),
}

impl DryRunState {
    pub fn is_dry_running(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// How a dry run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Changes kept in the working tree
    Committed,
    /// Working tree restored to the baseline
    Aborted,
}

/// Drives the dry-run state machine for one project
pub struct DryRunController<'a> {
    project: &'a Project,
}

impl<'a> DryRunController<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self { project }
    }

    /// Current state, read from the marker
    pub fn state(&self) -> Result<DryRunState> {
        Ok(match marker::read(&self.project.marker_path())? {
            MarkerState::Absent | MarkerState::Inactive => DryRunState::Idle,
            MarkerState::Active(session) => DryRunState::DryRunning(session),
            MarkerState::Corrupt(reason) => DryRunState::Corrupt(reason),
        })
    }

    pub fn is_dry_running(&self) -> Result<bool> {
        Ok(self.state()?.is_dry_running())
    }

    /// The active session, or a precondition error
    ///
    /// Callers that go on to write artifacts should hold the project lock.
    pub fn require_session(&self) -> Result<DryRunSession> {
        match self.state()? {
            DryRunState::DryRunning(session) => Ok(session),
            DryRunState::Idle => Err(Error::NoDryRun),
            DryRunState::Corrupt(reason) => Err(self.corrupt(reason)),
        }
    }

    /// Succeeds only when no dry run is active
    pub fn require_idle(&self) -> Result<()> {
        if self.is_dry_running()? {
            return Err(Error::DryRunInProgress);
        }
        Ok(())
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::CorruptSession {
            path: self.project.marker_path(),
            reason,
        }
    }

    /// Begin a dry run, remembering `working_dir` for build script capture
    ///
    /// Returns `false` without side effects if a dry run is already active.
    pub fn begin(&self, working_dir: &Path) -> Result<bool> {
        let _lock = self.project.lock()?;
        let marker_path = self.project.marker_path();

        match marker::read(&marker_path)? {
            MarkerState::Absent => {}
            MarkerState::Inactive => {
                warn!("Removing stale inactive dry-run marker");
                marker::remove(&marker_path)?;
            }
            MarkerState::Active(_) | MarkerState::Corrupt(_) => return Ok(false),
        }

        let store = self.project.snapshots()?;
        let baseline = store.snapshot("dry-run baseline")?;
        let empty_dirs =
            filesystem::empty_dirs(self.project.root(), |rel| self.project.is_ignored(rel))?;

        let session = DryRunSession::new(baseline, working_dir.to_path_buf(), empty_dirs);
        if !marker::create(&marker_path, &session)? {
            return Ok(false);
        }

        info!("Dry run started from snapshot {}", baseline.short());
        Ok(true)
    }

    /// End the dry run, reverting the tree when `abort` is set
    ///
    /// Returns `None` when no dry run is active. The marker is removed even
    /// if reverting fails; the revert error is returned afterwards.
    pub fn finish(&self, abort: bool) -> Result<Option<FinishOutcome>> {
        let _lock = self.project.lock()?;
        let marker_path = self.project.marker_path();

        let session = match marker::read(&marker_path)? {
            MarkerState::Absent => return Ok(None),
            MarkerState::Inactive => {
                marker::remove(&marker_path)?;
                return Ok(None);
            }
            MarkerState::Corrupt(reason) => {
                marker::remove(&marker_path)?;
                return Err(self.corrupt(reason));
            }
            MarkerState::Active(session) => session,
        };

        let reverted = if abort {
            self.revert(&session)
        } else {
            Ok(())
        };

        marker::remove(&marker_path)?;
        reverted?;

        let outcome = if abort {
            info!("Dry run aborted, tree restored to {}", session.baseline.short());
            FinishOutcome::Aborted
        } else {
            info!("Dry run finished, changes kept");
            FinishOutcome::Committed
        };
        Ok(Some(outcome))
    }

    fn revert(&self, session: &DryRunSession) -> Result<()> {
        let store = self.project.snapshots()?;
        store.revert(&session.baseline)?;
        let root = self.project.root();
        filesystem::prune_empty_dirs(root, &session.empty_dirs, |rel| {
            self.project.is_ignored(rel)
        })?;
        // Empty directories removed by the build
        for dir in &session.empty_dirs {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(())
    }
}
