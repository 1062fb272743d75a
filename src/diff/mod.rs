// src/diff/mod.rs

//! Diff extraction: what the build changed since the dry run began
//!
//! A [`ChangeSet`] is recomputed from the snapshot history on every
//! generator invocation and never persisted. Computing it stages the working
//! tree into the history's index but leaves the tree itself untouched, so it
//! can be called any number of times within a session.

pub mod classifier;
pub mod ignore;

pub use crate::snapshot::ChangeKind;
pub use classifier::{Category, PathClassifier};
pub use ignore::IgnoreRules;

use crate::error::Result;
use crate::project::Project;
use crate::snapshot::{SnapshotId, TreeChange};
use crate::transaction::DryRunSession;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// One changed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// Path relative to the project root, `/`-separated
    pub path: String,
    pub kind: ChangeKind,
    pub category: Category,
    /// Previous location, for renames
    pub old_path: Option<String>,
}

/// Changes between a session's baseline and the working tree
#[derive(Debug, Clone)]
pub struct ChangeSet {
    baseline: SnapshotId,
    entries: Vec<ChangeEntry>,
    baseline_files: Vec<String>,
}

impl ChangeSet {
    /// Diff the working tree against the session baseline
    pub fn compute(project: &Project, session: &DryRunSession) -> Result<Self> {
        let store = project.snapshots()?;
        let changes = store.diff(&session.baseline)?;
        let baseline_files = store.list(&session.baseline, None)?;

        let set = Self::from_changes(
            session.baseline,
            changes,
            baseline_files,
            project.ignore_rules(),
        );
        debug!(
            "{} changes since {}",
            set.entries.len(),
            session.baseline.short()
        );
        Ok(set)
    }

    /// Classify raw tree changes, dropping ignored paths
    pub fn from_changes(
        baseline: SnapshotId,
        changes: Vec<TreeChange>,
        baseline_files: Vec<String>,
        ignore: &IgnoreRules,
    ) -> Self {
        let mut entries: Vec<ChangeEntry> = changes
            .into_iter()
            .filter(|c| !ignore.is_ignored(Path::new(&c.path)))
            .map(|c| ChangeEntry {
                category: PathClassifier::classify(Path::new(&c.path)),
                path: c.path,
                kind: c.kind,
                old_path: c.old_path,
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut baseline_files: Vec<String> = baseline_files
            .into_iter()
            .filter(|p| !ignore.is_ignored(Path::new(p)))
            .collect();
        baseline_files.sort();

        Self {
            baseline,
            entries,
            baseline_files,
        }
    }

    pub fn baseline(&self) -> SnapshotId {
        self.baseline
    }

    /// All entries, ordered by path
    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one category
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Entries at or below a project-relative directory
    pub fn under<'s>(&'s self, dir: &'s str) -> impl Iterator<Item = &'s ChangeEntry> + 's {
        self.entries.iter().filter(move |e| is_under(&e.path, dir))
    }

    /// File paths in the working tree: the baseline listing with the
    /// changes applied, ordered by path
    pub fn current_paths(&self) -> BTreeSet<String> {
        let mut paths: BTreeSet<String> = self.baseline_files.iter().cloned().collect();

        for entry in &self.entries {
            match entry.kind {
                ChangeKind::Added | ChangeKind::Modified => {
                    paths.insert(entry.path.clone());
                }
                ChangeKind::Removed => {
                    paths.remove(&entry.path);
                }
                ChangeKind::Renamed => {
                    if let Some(old) = &entry.old_path {
                        paths.remove(old);
                    }
                    paths.insert(entry.path.clone());
                }
            }
        }

        paths
    }

    /// Current file paths at or below a project-relative directory
    pub fn current_paths_under(&self, dir: &str) -> Vec<String> {
        self.current_paths()
            .into_iter()
            .filter(|p| is_under(p, dir))
            .collect()
    }
}

/// True if `path` is `dir` or lies below it, comparing whole components
pub fn is_under(path: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
