// src/snapshot/mod.rs

//! Snapshot store: content-addressed history of the project tree
//!
//! The history is a bare git repository under `.drydock/history` whose work
//! tree is aliased onto the project root when it is opened (the bare-alias
//! technique). The project directory itself never gets a `.git`, so a
//! package checkout under `src/` can carry its own repository untouched.
//!
//! The repository index serves as a stat cache for staging: a file whose
//! timestamps, size and inode match its index entry is not hashed again.
//! Snapshots are commits; a tree identical to HEAD's reuses HEAD instead of
//! adding a duplicate history entry.

use crate::diff::ignore::IgnoreRules;
use crate::error::{Error, Result};
use crate::filesystem::path::to_slash;
use git2::build::CheckoutBuilder;
use git2::{
    Commit, Delta, DiffFindOptions, DiffOptions, ErrorCode, IndexEntry, ObjectType, Oid,
    Repository, ResetType, Signature, TreeWalkMode, TreeWalkResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use tracing::{debug, info};
use walkdir::WalkDir;

const SIGNATURE_NAME: &str = "drydock";
const SIGNATURE_EMAIL: &str = "drydock@localhost";

/// Identifier of a recorded tree state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(Oid);

impl SnapshotId {
    pub fn oid(&self) -> Oid {
        self.0
    }

    /// Abbreviated form for user-facing messages
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(12).collect()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Oid::from_str(s)
            .map(SnapshotId)
            .map_err(|e| Error::ParseError(format!("invalid snapshot id {s:?}: {}", e.message())))
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.to_string()
    }
}

/// How a path differs between a snapshot and the working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Renamed => "renamed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One changed path, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChange {
    pub path: String,
    pub kind: ChangeKind,
    /// Previous location, for renames
    pub old_path: Option<String>,
}

/// History of the project tree
pub struct SnapshotStore {
    repo: Repository,
    root: PathBuf,
    ignore: IgnoreRules,
}

impl SnapshotStore {
    /// Create an empty history in `git_dir` for the tree at `root`
    pub fn init(root: &Path, git_dir: &Path, ignore: IgnoreRules) -> Result<Self> {
        if git_dir.exists() {
            return Err(Error::AlreadyInitialized(root.to_path_buf()));
        }

        info!("Creating snapshot history in {}", git_dir.display());
        let repo = Repository::init_bare(git_dir)?;
        Self::attach(repo, root, ignore)
    }

    /// Open an existing history for the tree at `root`
    pub fn open(root: &Path, git_dir: &Path, ignore: IgnoreRules) -> Result<Self> {
        let repo = Repository::open_bare(git_dir)?;
        Self::attach(repo, root, ignore)
    }

    fn attach(repo: Repository, root: &Path, ignore: IgnoreRules) -> Result<Self> {
        repo.set_workdir(root, false)?;

        let store = Self {
            repo,
            root: root.to_path_buf(),
            ignore,
        };
        store.write_exclude_file()?;
        Ok(store)
    }

    /// Keep `info/exclude` in sync so checkouts never touch ignored paths
    fn write_exclude_file(&self) -> Result<()> {
        let path = self.repo.path().join("info").join("exclude");
        let content = self.ignore.exclude_file();
        if fs::read_to_string(&path).ok().as_deref() == Some(content.as_str()) {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(())
    }

    /// Project root this history observes
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stage the working tree into the index and return the resulting tree id
    ///
    /// Every file not matched by the ignore rules is staged, including files
    /// that a `.gitignore` inside the tree would hide. The tree is walked
    /// file by file, so a package directory that is itself a repository is
    /// recorded as plain content instead of a gitlink.
    fn stage(&self) -> Result<Oid> {
        let mut index = self.repo.index()?;
        let staged_at = fs::metadata(self.repo.path().join("index"))
            .and_then(|m| m.modified())
            .ok();

        let mut present: HashSet<Vec<u8>> = HashSet::new();
        let mut rehashed = 0usize;
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .is_ok_and(|rel| !self.ignore.is_ignored(rel))
            });

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = rel.as_os_str().as_bytes().to_vec();

            let metadata = entry.metadata()?;
            let clean = index
                .get_path(rel, 0)
                .is_some_and(|cached| stat_matches(&cached, &metadata, staged_at));
            if !clean {
                index.add_path(rel)?;
                rehashed += 1;
            }
            present.insert(key);
        }

        let vanished: Vec<Vec<u8>> = index
            .iter()
            .map(|e| e.path)
            .filter(|p| !present.contains(p))
            .collect();
        for path in &vanished {
            index.remove_path(Path::new(OsStr::from_bytes(path)))?;
        }

        debug!(
            "Staged {} files ({} rehashed, {} removed)",
            present.len(),
            rehashed,
            vanished.len()
        );
        index.write()?;
        Ok(index.write_tree()?)
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest snapshot, if any
    pub fn head(&self) -> Result<Option<SnapshotId>> {
        Ok(self.head_commit()?.map(|c| SnapshotId(c.id())))
    }

    /// Record the current tree state
    ///
    /// Returns the existing HEAD when the tree is unchanged since the last snapshot.
    pub fn snapshot(&self, message: &str) -> Result<SnapshotId> {
        let tree_id = self.stage()?;
        let parent = self.head_commit()?;

        if let Some(parent) = &parent
            && parent.tree_id() == tree_id
        {
            debug!("Tree unchanged, reusing snapshot {}", parent.id());
            return Ok(SnapshotId(parent.id()));
        }

        let tree = self.repo.find_tree(tree_id)?;
        let signature = Signature::now(SIGNATURE_NAME, SIGNATURE_EMAIL)?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        info!("Recorded snapshot {}: {}", oid, message);
        Ok(SnapshotId(oid))
    }

    /// Changes from a snapshot to the current working tree, sorted by path
    pub fn diff(&self, from: &SnapshotId) -> Result<Vec<TreeChange>> {
        let baseline = self.repo.find_commit(from.0)?.tree()?;
        let current = self.repo.find_tree(self.stage()?)?;

        let mut options = DiffOptions::new();
        options.include_typechange(true);
        let mut diff =
            self.repo
                .diff_tree_to_tree(Some(&baseline), Some(&current), Some(&mut options))?;

        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let new_path = delta.new_file().path().map(to_slash);
            let old_path = delta.old_file().path().map(to_slash);

            let (path, kind, old_path) = match delta.status() {
                Delta::Added | Delta::Untracked | Delta::Copied => {
                    (new_path, ChangeKind::Added, None)
                }
                Delta::Modified | Delta::Typechange => (new_path, ChangeKind::Modified, None),
                Delta::Deleted => (old_path, ChangeKind::Removed, None),
                Delta::Renamed => (new_path, ChangeKind::Renamed, old_path),
                _ => continue,
            };

            if let Some(path) = path {
                changes.push(TreeChange {
                    path,
                    kind,
                    old_path,
                });
            }
        }

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }

    /// File paths recorded in a snapshot, optionally restricted to a directory prefix
    pub fn list(&self, id: &SnapshotId, prefix: Option<&str>) -> Result<Vec<String>> {
        let tree = self.repo.find_commit(id.0)?.tree()?;
        let prefix = prefix.map(|p| format!("{}/", p.trim_end_matches('/')));

        let mut paths = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob)
                && let Some(name) = entry.name()
            {
                let path = format!("{dir}{name}");
                if prefix.as_deref().is_none_or(|p| path.starts_with(p)) {
                    paths.push(path);
                }
            }
            TreeWalkResult::Ok
        })?;

        paths.sort();
        Ok(paths)
    }

    /// Restore the working tree to a snapshot
    ///
    /// Tracked files are rewritten and untracked files removed by a forced
    /// hard reset. Files that a `.gitignore` in the tree hides from the reset
    /// are found by diffing again and deleted. Empty directories are left to
    /// the caller.
    pub fn revert(&self, id: &SnapshotId) -> Result<()> {
        let commit = self.repo.find_commit(id.0)?;
        // Refresh the index so the reset sees every change
        self.stage()?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo
            .reset(commit.as_object(), ResetType::Hard, Some(&mut checkout))?;

        for change in self.diff(id)? {
            if !matches!(change.kind, ChangeKind::Added | ChangeKind::Renamed) {
                continue;
            }
            let path = self.root.join(&change.path);
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed leftover {}", change.path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!("Reverted working tree to snapshot {}", id.short());
        Ok(())
    }
}

/// True if the index entry still describes the file on disk
///
/// An entry written in the same instant as the index itself is never
/// trusted: a rewrite within that clock tick keeps the same timestamp.
fn stat_matches(
    cached: &IndexEntry,
    metadata: &fs::Metadata,
    staged_at: Option<SystemTime>,
) -> bool {
    let (Some(staged_at), Ok(modified)) = (staged_at, metadata.modified()) else {
        return false;
    };
    modified < staged_at
        && i64::from(cached.mtime.seconds()) == metadata.mtime()
        && i64::from(cached.mtime.nanoseconds()) == metadata.mtime_nsec()
        && i64::from(cached.ctime.seconds()) == metadata.ctime()
        && i64::from(cached.ctime.nanoseconds()) == metadata.ctime_nsec()
        && cached.file_size == metadata.len() as u32
        && cached.ino == metadata.ino() as u32
}
