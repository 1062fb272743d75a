// src/archive/package.rs

//! Source package archive

use super::TarGzWriter;
use crate::diff::{Category, ChangeSet, PathClassifier};
use crate::error::Result;
use crate::project::{Project, SRC_DIR};
use std::path::{Path, PathBuf};
use tracing::info;

/// Archive the current source files of a package into
/// `output/<package>/<package>.tar.gz`
///
/// Entries are rooted at `<package>/`. Build outputs under the package
/// (`target/`, `build/`, `dist/`) are left out.
pub fn archive_package(project: &Project, changes: &ChangeSet, package: &str) -> Result<PathBuf> {
    project.package_dir(package)?;

    let prefix = format!("{SRC_DIR}/{package}");
    let target = project
        .package_output_dir(package)
        .join(format!("{package}.tar.gz"));

    // Current paths come sorted and share the prefix, so names stay in order
    let mut writer = TarGzWriter::create(&target)?;
    for path in changes.current_paths_under(&prefix) {
        if PathClassifier::classify(Path::new(&path)) != Category::Source {
            continue;
        }
        let below = &path[prefix.len() + 1..];
        writer.append_path(&format!("{package}/{below}"), &project.root().join(&path))?;
    }
    let count = writer.finish()?;

    info!("Package archive {} written ({} files)", target.display(), count);
    Ok(target)
}
