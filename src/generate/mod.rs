// src/generate/mod.rs

//! Diff-driven generators for specs and build scripts
//!
//! Generators load the previously generated artifact (if any), derive fresh
//! managed units from the current change set, merge the two and write the
//! result atomically. Merge conflicts are reported through the returned
//! count; they never fail the generation.

pub mod history;
pub mod managed;
pub mod script;
pub mod spec;

pub use managed::{ConflictKind, Document, Line, Scope, Unit};
pub use script::generate_build_script;
pub use spec::{generate_kit_spec, generate_package_spec};

use crate::error::Result;
use crate::filesystem::write_atomic;
use crate::hash::{hash_reader, sha256, HashAlgorithm};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A written artifact and the number of unresolved conflicts in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub path: PathBuf,
    pub conflicts: usize,
}

/// Load a previously generated document, or parse `template` if there is none
pub(crate) fn load_or_template(path: &Path, template: &str) -> Result<Document> {
    match fs::read_to_string(path) {
        Ok(text) => {
            debug!("Merging into existing {}", path.display());
            Ok(Document::parse(&text))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Document::parse(template)),
        Err(e) => Err(e.into()),
    }
}

/// Write a merged document and report its conflicts
pub(crate) fn write_document(path: &Path, document: &Document, mode: u32) -> Result<GenerationResult> {
    write_atomic(path, document.render().as_bytes(), mode)?;
    let conflicts = document.conflict_count();
    info!("{} written with {} conflicts", path.display(), conflicts);
    Ok(GenerationResult {
        path: path.to_path_buf(),
        conflicts,
    })
}

/// Digest identifying what a file currently holds
///
/// SHA-256 of the content, or of the link target for symlinks.
pub(crate) fn path_digest(path: &Path) -> Result<String> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(path)?;
        return Ok(sha256(format!("symlink:{}", target.display()).as_bytes()));
    }
    Ok(hash_reader(HashAlgorithm::Sha256, &mut File::open(path)?)?)
}
