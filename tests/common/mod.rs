// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use drydock::{DryRunController, DryRunSession, Project};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

/// State of one path in a project tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    Dir,
    File { contents: Vec<u8>, executable: bool },
    Symlink(String),
}

/// Create a fresh project in a temporary directory.
///
/// Returns (TempDir, Project) - keep the TempDir alive to prevent cleanup.
pub fn setup_project() -> (TempDir, Project) {
    let temp = TempDir::new().unwrap();
    let project = Project::init(temp.path()).unwrap();
    (temp, project)
}

/// Write a file, creating its parent directories
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Write an executable file
pub fn write_executable(root: &Path, rel: &str, contents: &str) {
    write_file(root, rel, contents);
    fs::set_permissions(root.join(rel), fs::Permissions::from_mode(0o755)).unwrap();
}

/// Create a symlink, creating its parent directories
pub fn write_symlink(root: &Path, rel: &str, target: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    symlink(target, path).unwrap();
}

/// Every path below `root` except drydock's own state, with its content
pub fn tree_state(root: &Path) -> BTreeMap<String, TreeEntry> {
    let mut state = BTreeMap::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".drydock");

    for entry in walker {
        let entry = entry.unwrap();
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let file_type = entry.file_type();

        let value = if file_type.is_symlink() {
            TreeEntry::Symlink(
                fs::read_link(entry.path())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned(),
            )
        } else if file_type.is_dir() {
            TreeEntry::Dir
        } else {
            TreeEntry::File {
                contents: fs::read(entry.path()).unwrap(),
                executable: entry.metadata().unwrap().permissions().mode() & 0o111 != 0,
            }
        };
        state.insert(rel, value);
    }
    state
}

/// Begin a dry run from the project root and return its session
pub fn start_dry_run(project: &Project) -> DryRunSession {
    let controller = DryRunController::new(project);
    assert!(controller.begin(project.root()).unwrap());
    controller.require_session().unwrap()
}
