// src/archive/kit.rs

//! Incremental kit archive
//!
//! `output/kit/kit.tar.gz` holds every kit item; `kit.manifest.json` next to
//! it records each item's fingerprint and entries. An incremental run reads
//! the previous manifest, copies the entries of items whose fingerprint is
//! unchanged straight out of the previous archive, and reads only changed
//! items from disk. Both sources are streamed in a single pass.

use super::{entry_names, open_tar_gz, TarGzWriter};
use crate::error::{Error, Result};
use crate::filesystem::write_atomic;
use crate::kit::{Kit, KitItem};
use crate::project::Project;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Entries, Entry};
use tracing::{debug, info, warn};

/// Archive file name inside `output/kit/`
pub const KIT_ARCHIVE_NAME: &str = "kit.tar.gz";
/// Manifest file name inside `output/kit/`
pub const KIT_MANIFEST_NAME: &str = "kit.manifest.json";

/// One archived kit item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    /// Project-relative item path
    pub path: String,
    /// XXH128 content fingerprint
    pub fingerprint: String,
    /// Archive entry names, ordered
    pub entries: Vec<String>,
}

/// Record of the items in a kit archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitManifest {
    pub items: Vec<ManifestItem>,
    /// Items rewritten from disk by the run that produced this manifest
    #[serde(default)]
    pub updated: Vec<String>,
}

impl KitManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn item(&self, path: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|i| i.path == path)
    }
}

/// Outcome of [`archive_kit`]
#[derive(Debug, Clone)]
pub struct KitArchiveResult {
    pub archive_path: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: KitManifest,
}

/// Previous archive usable for carrying over unchanged items
struct PreviousArchive {
    fingerprints: HashMap<String, ManifestItem>,
    names: BTreeSet<String>,
}

impl PreviousArchive {
    fn load(archive_path: &Path, manifest_path: &Path) -> Option<Self> {
        if !archive_path.exists() || !manifest_path.exists() {
            return None;
        }

        let manifest = match KitManifest::load(manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Ignoring unreadable kit manifest: {}", e);
                return None;
            }
        };
        // A full scan up front keeps a damaged archive from failing halfway
        // through the rewrite
        let names = match entry_names(archive_path) {
            Ok(names) => names,
            Err(e) => {
                warn!("Ignoring unreadable kit archive: {}", e);
                return None;
            }
        };

        let fingerprints = manifest
            .items
            .into_iter()
            .map(|i| (i.path.clone(), i))
            .collect();
        Some(Self {
            fingerprints,
            names,
        })
    }

    /// True if the item was archived with the same fingerprint and all its
    /// entries are still in the archive
    fn reusable(&self, item: &KitItem, fingerprint: &str) -> bool {
        self.fingerprints.get(&item.path).is_some_and(|previous| {
            previous.fingerprint == fingerprint
                && previous.entries.iter().all(|name| self.names.contains(name))
        })
    }
}

/// Where an entry of the new archive comes from
enum Source {
    Disk,
    Previous,
}

/// Advance `entries` to the entry called `name`
///
/// Archives are written in name order, so entries passed over are never
/// needed later.
fn seek_entry<'a, R: 'a + Read>(
    entries: &mut Entries<'a, R>,
    name: &str,
) -> Result<Entry<'a, R>> {
    for entry in entries {
        let entry = entry?;
        if entry.path()?.to_string_lossy() == name {
            return Ok(entry);
        }
    }
    Err(Error::ParseError(format!(
        "{name} disappeared from the previous kit archive"
    )))
}

/// Archive the kit into `output/kit/kit.tar.gz`
///
/// With `full` set the previous archive is ignored and every item is read
/// from disk.
pub fn archive_kit(project: &Project, full: bool) -> Result<KitArchiveResult> {
    let kit_dir = project.kit_dir();
    if !kit_dir.is_dir() {
        return Err(Error::NoPackageDirectory(kit_dir));
    }

    let out_dir = project.output_dir().join("kit");
    let archive_path = out_dir.join(KIT_ARCHIVE_NAME);
    let manifest_path = out_dir.join(KIT_MANIFEST_NAME);

    let previous = if full {
        None
    } else {
        PreviousArchive::load(&archive_path, &manifest_path)
    };

    let root = project.root();
    let mut plan: Vec<(String, Source)> = Vec::new();
    let mut manifest = KitManifest::default();

    for item in Kit::new(project).items()? {
        let fingerprint = item.fingerprint(root)?;
        let names: Vec<String> = item.files.iter().map(|f| f.path.clone()).collect();

        if previous
            .as_ref()
            .is_some_and(|p| p.reusable(&item, &fingerprint))
        {
            debug!("Kit item {} unchanged", item.path);
            plan.extend(names.iter().map(|n| (n.clone(), Source::Previous)));
        } else {
            debug!("Kit item {} archived from disk", item.path);
            plan.extend(names.iter().map(|n| (n.clone(), Source::Disk)));
            manifest.updated.push(item.path.clone());
        }

        manifest.items.push(ManifestItem {
            path: item.path,
            fingerprint,
            entries: names,
        });
    }
    // Items nest (`kit/m2/g/a` holds files beside `kit/m2/g/a/1.0/`), so
    // item order is not entry order
    plan.sort_by(|a, b| a.0.cmp(&b.0));

    let carries_over = plan.iter().any(|(_, s)| matches!(s, Source::Previous));
    let mut previous_archive = if carries_over {
        Some(open_tar_gz(&archive_path)?)
    } else {
        None
    };
    let mut previous_entries = match previous_archive.as_mut() {
        Some(archive) => Some(archive.entries()?),
        None => None,
    };

    // The new archive only replaces the old one on finish, so both can be
    // open at once
    let mut writer = TarGzWriter::create(&archive_path)?;
    for (name, source) in &plan {
        match (source, previous_entries.as_mut()) {
            (Source::Previous, Some(entries)) => {
                writer.append_entry_from(name, seek_entry(entries, name)?)?;
            }
            _ => writer.append_path(name, &root.join(name))?,
        }
    }
    writer.finish()?;

    let json = serde_json::to_string_pretty(&manifest)?;
    write_atomic(&manifest_path, format!("{json}\n").as_bytes(), 0o644)?;

    info!(
        "Kit archive: {} items, {} updated",
        manifest.items.len(),
        manifest.updated.len()
    );
    Ok(KitArchiveResult {
        archive_path,
        manifest_path,
        manifest,
    })
}
