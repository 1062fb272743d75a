// src/filesystem/mod.rs

//! Filesystem operations for drydock
//!
//! This module provides:
//! - Atomic artifact writes (temp file + rename)
//! - Lexical path manipulation for replayed shell history
//! - Empty-directory bookkeeping, since the snapshot history only records files

pub mod atomic;
pub mod path;

pub use atomic::{move_file_atomic, write_atomic, AtomicFile};

use crate::error::Result;
use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// True if any execute bit is set
pub fn is_executable(metadata: &fs::Metadata) -> bool {
    metadata.permissions().mode() & 0o111 != 0
}

/// Relative paths of all empty directories below `root`
///
/// `skip` receives root-relative paths; skipped directories are not descended.
pub fn empty_dirs(root: &Path, skip: impl Fn(&Path) -> bool) -> Result<BTreeSet<String>> {
    let mut found = BTreeSet::new();

    let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|e| {
        e.path()
            .strip_prefix(root)
            .map(|rel| !skip(rel))
            .unwrap_or(false)
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if fs::read_dir(entry.path())?.next().is_none()
            && let Ok(rel) = entry.path().strip_prefix(root)
        {
            found.insert(path::to_slash(rel));
        }
    }

    Ok(found)
}

/// Remove empty directories below `root` that are not listed in `keep`
///
/// Directories are visited children-first, so a tree of empty directories
/// collapses entirely. Returns the number of directories removed.
pub fn prune_empty_dirs(
    root: &Path,
    keep: &BTreeSet<String>,
    skip: impl Fn(&Path) -> bool,
) -> Result<usize> {
    let mut removed = 0;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| {
            e.path()
                .strip_prefix(root)
                .map(|rel| !skip(rel))
                .unwrap_or(false)
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        if keep.contains(&path::to_slash(rel)) {
            continue;
        }
        if fs::read_dir(entry.path())?.next().is_none() {
            fs::remove_dir(entry.path())?;
            debug!("Pruned empty directory {}", rel.display());
            removed += 1;
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn skip_hidden(rel: &Path) -> bool {
        rel.starts_with(".drydock")
    }

    #[test]
    fn test_empty_dirs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("kit/empty")).unwrap();
        fs::create_dir_all(temp.path().join("src/app")).unwrap();
        fs::write(temp.path().join("src/app/pom.xml"), "<project/>").unwrap();
        fs::create_dir_all(temp.path().join(".drydock/empty")).unwrap();

        let dirs = empty_dirs(temp.path(), skip_hidden).unwrap();
        assert_eq!(dirs.into_iter().collect::<Vec<_>>(), vec!["kit/empty".to_string()]);
    }

    #[test]
    fn test_prune_keeps_listed_dirs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("kit/keep")).unwrap();
        fs::create_dir_all(temp.path().join("src/app/target/classes")).unwrap();
        fs::create_dir_all(temp.path().join(".drydock/history")).unwrap();

        let keep: BTreeSet<String> = ["kit/keep".to_string()].into();
        let removed = prune_empty_dirs(temp.path(), &keep, skip_hidden).unwrap();

        assert_eq!(removed, 4);
        assert!(temp.path().join("kit/keep").is_dir());
        assert!(!temp.path().join("src").exists());
        assert!(temp.path().join(".drydock/history").is_dir());
    }

    #[test]
    fn test_is_executable() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("mvn");
        fs::write(&file, "#!/bin/sh").unwrap();
        assert!(!is_executable(&fs::metadata(&file).unwrap()));
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&fs::metadata(&file).unwrap()));
    }
}
