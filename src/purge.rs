// src/purge.rs

//! Moving bundled jars out of source packages
//!
//! Upstream sources often ship prebuilt jars. They belong in the kit, so
//! `purge_jars` moves each one to `kit/jars/` and leaves a relative symlink
//! behind, keeping the source tree buildable.

use crate::error::Result;
use crate::filesystem::move_file_atomic;
use crate::filesystem::path::{relative_link_target, to_slash};
use crate::hash::{hash_reader, HashAlgorithm};
use crate::project::{Project, KIT_DIR};
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory below `kit/` receiving purged jars
pub const JARS_DIR: &str = "jars";

/// One jar moved into the kit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedJar {
    /// Project-relative original location, now a symlink
    pub source: String,
    /// Project-relative location in the kit
    pub destination: String,
    /// True if an identical jar was already in the kit
    pub reused: bool,
}

/// Move every regular `*.jar` under `src/` into `kit/jars/`
///
/// Callers must make sure no dry run is active.
pub fn purge_jars(project: &Project) -> Result<Vec<PurgedJar>> {
    let root = project.root();
    let jars_dir = project.kit_dir().join(JARS_DIR);

    let mut found = Vec::new();
    let walker = WalkDir::new(project.src_dir())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.path()
                .strip_prefix(root)
                .map(|rel| !project.is_ignored(rel))
                .unwrap_or(false)
        });
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "jar")
        {
            found.push(entry.into_path());
        }
    }

    let mut purged = Vec::with_capacity(found.len());
    for path in found {
        let (destination, reused) = place_jar(&path, &jars_dir)?;
        if reused {
            fs::remove_file(&path)?;
        } else {
            fs::create_dir_all(&jars_dir)?;
            move_file_atomic(&path, &destination)?;
        }

        let source_rel = path.strip_prefix(root).unwrap_or(&path);
        let destination_rel = destination.strip_prefix(root).unwrap_or(&destination);
        symlink(relative_link_target(source_rel, destination_rel), &path)?;

        debug!(
            "{} -> {}{}",
            source_rel.display(),
            destination_rel.display(),
            if reused { " (reused)" } else { "" }
        );
        purged.push(PurgedJar {
            source: to_slash(source_rel),
            destination: to_slash(destination_rel),
            reused,
        });
    }

    info!("Purged {} jars into {}/{}", purged.len(), KIT_DIR, JARS_DIR);
    Ok(purged)
}

/// Pick the kit location for `jar`
///
/// Returns an existing identical jar with `true`, or the first free name of
/// the form `<stem>.jar`, `<stem>-1.jar`, `<stem>-2.jar`, ... with `false`.
fn place_jar(jar: &Path, jars_dir: &Path) -> Result<(PathBuf, bool)> {
    let stem = jar
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digest = file_digest(jar)?;

    let mut n = 0;
    loop {
        let name = if n == 0 {
            format!("{stem}.jar")
        } else {
            format!("{stem}-{n}.jar")
        };
        let candidate = jars_dir.join(name);
        match fs::symlink_metadata(&candidate) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((candidate, false)),
            Err(e) => return Err(e.into()),
            Ok(meta) if meta.is_file() && file_digest(&candidate)? == digest => {
                return Ok((candidate, true));
            }
            Ok(_) => n += 1,
        }
    }
}

fn file_digest(path: &Path) -> Result<String> {
    Ok(hash_reader(HashAlgorithm::Sha256, &mut File::open(path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_purge_jars() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        write(temp.path(), "src/app/lib/a.jar", "a");
        write(temp.path(), "src/app/lib/Main.java", "class Main {}");
        write(temp.path(), "src/other/a.jar", "a different");
        write(temp.path(), "src/third/a.jar", "a");

        let purged = purge_jars(&project).unwrap();
        assert_eq!(purged.len(), 3);
        assert_eq!(
            purged[0],
            PurgedJar {
                source: "src/app/lib/a.jar".to_string(),
                destination: "kit/jars/a.jar".to_string(),
                reused: false,
            }
        );
        assert_eq!(purged[1].destination, "kit/jars/a-1.jar");
        assert_eq!(purged[2].destination, "kit/jars/a.jar");
        assert!(purged[2].reused);

        let link = temp.path().join("src/app/lib/a.jar");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            fs::read_link(&link).unwrap(),
            PathBuf::from("../../../kit/jars/a.jar")
        );
        assert_eq!(fs::read_to_string(&link).unwrap(), "a");
        assert_eq!(
            fs::read_to_string(temp.path().join("src/other/a.jar")).unwrap(),
            "a different"
        );
        assert!(temp.path().join("src/app/lib/Main.java").is_file());
    }

    #[test]
    fn test_purge_skips_symlinks() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        write(temp.path(), "src/app/a.jar", "a");

        assert_eq!(purge_jars(&project).unwrap().len(), 1);
        assert!(purge_jars(&project).unwrap().is_empty());
    }
}
