// src/project.rs

//! Project layout and discovery
//!
//! A project is a directory with a `.drydock/` state directory at its root:
//!
//! ```text
//! <root>/
//! ├── .drydock/
//! │   ├── history/       snapshot history (bare repository)
//! │   ├── dry_run.json   session marker, present while a dry run is active
//! │   ├── lock           advisory lock
//! │   └── config.toml
//! ├── src/<package>/     one subtree per source package
//! ├── kit/               binary dependencies
//! └── output/            generated artifacts
//! ```

use crate::config::ProjectConfig;
use crate::diff::ignore::{IgnoreRules, STATE_DIR};
use crate::error::{Error, Result};
use crate::filesystem::write_atomic;
use crate::lock::ProjectLock;
use crate::snapshot::SnapshotStore;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Source package root, relative to the project root
pub const SRC_DIR: &str = "src";
/// Binary dependency root, relative to the project root
pub const KIT_DIR: &str = "kit";
/// Generated artifact root, relative to the project root
pub const OUTPUT_DIR: &str = "output";

/// An initialized drydock project
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: ProjectConfig,
    ignore: IgnoreRules,
}

impl Project {
    /// Turn `dir` into a project: create the state directory, a default
    /// configuration, the snapshot history and its first snapshot
    pub fn init(dir: &Path) -> Result<Self> {
        let root = fs::canonicalize(dir)?;
        let state_dir = root.join(STATE_DIR);
        let history_dir = state_dir.join("history");

        if history_dir.exists() {
            return Err(Error::AlreadyInitialized(root));
        }

        fs::create_dir_all(&state_dir)?;
        let config_path = state_dir.join("config.toml");
        let config = if config_path.exists() {
            ProjectConfig::load(&config_path)?
        } else {
            let config = ProjectConfig::default();
            write_atomic(&config_path, config.to_toml()?.as_bytes(), 0o644)?;
            config
        };

        fs::create_dir_all(root.join(SRC_DIR))?;
        fs::create_dir_all(root.join(KIT_DIR).join(&config.kit.maven_repository))?;

        let ignore = IgnoreRules::new(&config.ignore.patterns)?;
        let project = Self {
            root,
            config,
            ignore,
        };

        let store = SnapshotStore::init(&project.root, &history_dir, project.ignore.clone())?;
        store.snapshot("project initialized")?;

        info!("Initialized drydock project at {}", project.root.display());
        Ok(project)
    }

    /// Find the project containing `start` by walking up to the nearest
    /// ancestor with a state directory
    pub fn find(start: &Path) -> Result<Self> {
        let start = fs::canonicalize(start)
            .map_err(|_| Error::NoProjectDirectory(start.to_path_buf()))?;

        for dir in start.ancestors() {
            if dir.join(STATE_DIR).join("history").is_dir() {
                debug!("Found project at {}", dir.display());
                return Self::open(dir);
            }
        }

        Err(Error::NoProjectDirectory(start))
    }

    /// Open the project rooted exactly at `root`
    pub fn open(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)?;
        if !root.join(STATE_DIR).join("history").is_dir() {
            return Err(Error::NoProjectDirectory(root));
        }

        let config = ProjectConfig::load(&root.join(STATE_DIR).join("config.toml"))?;
        let ignore = IgnoreRules::new(&config.ignore.patterns)?;
        Ok(Self {
            root,
            config,
            ignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }

    /// Project name, taken from the root directory name
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn history_dir(&self) -> PathBuf {
        self.state_dir().join("history")
    }

    pub fn marker_path(&self) -> PathBuf {
        self.state_dir().join("dry_run.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join(SRC_DIR)
    }

    pub fn kit_dir(&self) -> PathBuf {
        self.root.join(KIT_DIR)
    }

    /// Maven repository inside the kit
    pub fn maven_repository_dir(&self) -> PathBuf {
        self.kit_dir().join(&self.config.kit.maven_repository)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Directory receiving a package's generated artifacts
    pub fn package_output_dir(&self, package: &str) -> PathBuf {
        self.output_dir().join(package)
    }

    /// Open the snapshot history
    pub fn snapshots(&self) -> Result<SnapshotStore> {
        SnapshotStore::open(&self.root, &self.history_dir(), self.ignore.clone())
    }

    /// Take the project-wide lock
    pub fn lock(&self) -> Result<ProjectLock> {
        ProjectLock::acquire(self.lock_path())
    }

    /// True if a project-relative path is excluded from observation
    pub fn is_ignored(&self, rel: &Path) -> bool {
        self.ignore.is_ignored(rel)
    }

    /// Package name for a directory at or below `src/<name>/`
    pub fn package_name_for(&self, dir: &Path) -> Result<String> {
        let not_a_package = || Error::NoPackageDirectory(dir.to_path_buf());

        let absolute = fs::canonicalize(dir).map_err(|_| not_a_package())?;
        if !absolute.is_dir() {
            return Err(not_a_package());
        }

        let rel = absolute
            .strip_prefix(self.src_dir())
            .map_err(|_| not_a_package())?;
        match rel.components().next() {
            Some(Component::Normal(name)) => Ok(name.to_string_lossy().into_owned()),
            _ => Err(not_a_package()),
        }
    }

    /// Directory of an existing package
    pub fn package_dir(&self, package: &str) -> Result<PathBuf> {
        let dir = self.src_dir().join(package);
        if package.is_empty() || package.contains('/') || !dir.is_dir() {
            return Err(Error::NoPackageDirectory(dir));
        }
        Ok(dir)
    }
}
