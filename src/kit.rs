// src/kit.rs

//! The binary dependency kit
//!
//! Everything under `kit/` is grouped into items, the units of incremental
//! archiving:
//! - a file inside the Maven repository (`kit/m2/` by default) belongs to the
//!   item of its directory, which for an artifact is the
//!   `groupId/artifactId/version` directory
//! - any other file belongs to the item named by its first path component
//!   under `kit/`, e.g. an unpacked `apache-maven-3.9.6/` distribution

use crate::error::{Error, Result};
use crate::filesystem::{self, path::to_slash};
use crate::hash::{HashAlgorithm, Hasher};
use crate::project::{Project, KIT_DIR};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Content of one kit file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KitFileKind {
    Regular { executable: bool },
    Symlink { target: String },
}

/// One file in the kit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitFile {
    /// Project-relative path, e.g. `kit/m2/junit/junit/4.13/junit-4.13.jar`
    pub path: String,
    pub kind: KitFileKind,
}

/// One archivable unit of the kit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitItem {
    /// Project-relative path identifying the item
    pub path: String,
    /// Files of the item, ordered by path
    pub files: Vec<KitFile>,
}

impl KitItem {
    /// XXH128 over the paths, types and contents of the item's files
    pub fn fingerprint(&self, root: &Path) -> Result<String> {
        let mut hasher = Hasher::new(HashAlgorithm::Xxh128);
        let mut buffer = [0u8; 8192];

        for file in &self.files {
            hasher.update_field(file.path.as_bytes());
            match &file.kind {
                KitFileKind::Regular { executable } => {
                    hasher.update_field(if *executable { b"x" } else { b"f" });
                    let mut reader = File::open(root.join(&file.path))?;
                    let len = fs::metadata(root.join(&file.path))?.len();
                    hasher.update(&len.to_le_bytes());
                    loop {
                        let n = reader.read(&mut buffer)?;
                        if n == 0 {
                            break;
                        }
                        hasher.update(&buffer[..n]);
                    }
                }
                KitFileKind::Symlink { target } => {
                    hasher.update_field(b"l");
                    hasher.update_field(target.as_bytes());
                }
            }
        }

        Ok(hasher.finalize())
    }
}

/// Item a kit file belongs to
///
/// `rel` is the path below `kit/`; the result is project-relative.
pub fn item_path_for(rel: &Path, maven_repository: &str) -> String {
    let components: Vec<String> = to_slash(rel).split('/').map(str::to_string).collect();

    let item: Vec<&str> = if components.len() > 1 && components[0] == maven_repository {
        components[..components.len() - 1]
            .iter()
            .map(String::as_str)
            .collect()
    } else {
        components.iter().take(1).map(String::as_str).collect()
    };

    format!("{KIT_DIR}/{}", item.join("/"))
}

/// View of a project's kit directory
pub struct Kit<'a> {
    project: &'a Project,
}

impl<'a> Kit<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self { project }
    }

    /// All files under `kit/`, ordered by path; directories are not listed
    pub fn files(&self) -> Result<Vec<KitFile>> {
        let root = self.project.root();
        let kit_dir = self.project.kit_dir();
        if !kit_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&kit_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path()
                    .strip_prefix(root)
                    .map(|rel| !self.project.is_ignored(rel))
                    .unwrap_or(false)
            });

        for entry in walker {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };

            let kind = if file_type.is_symlink() {
                KitFileKind::Symlink {
                    target: fs::read_link(entry.path())?.to_string_lossy().into_owned(),
                }
            } else {
                KitFileKind::Regular {
                    executable: filesystem::is_executable(&entry.metadata()?),
                }
            };

            files.push(KitFile {
                path: to_slash(rel),
                kind,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Files grouped into items, ordered by item path
    pub fn items(&self) -> Result<Vec<KitItem>> {
        let maven_repository = &self.project.config().kit.maven_repository;
        let kit_prefix = format!("{KIT_DIR}/");

        let mut grouped: BTreeMap<String, Vec<KitFile>> = BTreeMap::new();
        for file in self.files()? {
            let below_kit = file.path.strip_prefix(&kit_prefix).unwrap_or(&file.path);
            let item = item_path_for(Path::new(below_kit), maven_repository);
            grouped.entry(item).or_default().push(file);
        }

        Ok(grouped
            .into_iter()
            .map(|(path, files)| KitItem { path, files })
            .collect())
    }

    /// Find an executable at `kit/**/bin/<name>`
    pub fn find_executable(&self, name: &str) -> Result<PathBuf> {
        for file in self.files()? {
            let path = Path::new(&file.path);
            let in_bin = path
                .parent()
                .and_then(|p| p.file_name())
                .is_some_and(|dir| dir == "bin");
            if in_bin && path.file_name().is_some_and(|f| f == name) {
                let found = self.project.root().join(path);
                debug!("Found {} executable: {}", name, found.display());
                return Ok(found);
            }
        }

        debug!("{} executable not found in kit", name);
        Err(Error::ExecutableNotFound(name.to_string()))
    }
}
