// src/archive/mod.rs

//! Deterministic tar.gz archives
//!
//! Archives written here depend only on their entries: entries are sorted by
//! name, owners are root, the mtime is fixed (`SOURCE_DATE_EPOCH` or
//! 2024-01-01) and modes are normalized to 0644/0755. The gzip header carries
//! neither a file name nor a timestamp. Re-archiving an unchanged tree
//! therefore produces a byte-identical file.
//!
//! Entries copied out of an earlier archive are re-emitted with the same
//! normalized headers, so unchanged kit items can be carried over without
//! touching the kit tree. Contents are streamed from disk or from the
//! earlier archive; nothing holds a whole archive in memory.

pub mod kit;
pub mod package;

pub use kit::{archive_kit, KitArchiveResult, KitManifest, ManifestItem};
pub use package::archive_package;

use crate::error::Result;
use crate::filesystem::{self, AtomicFile};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Entry, EntryType, Header};
use tracing::debug;

/// Fallback archive mtime: 2024-01-01 00:00:00 UTC
pub const DEFAULT_MTIME: u64 = 1704067200;

/// Archive entry mtime, honouring `SOURCE_DATE_EPOCH`
pub fn archive_mtime() -> u64 {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_MTIME)
}

/// Payload of an archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryData {
    File { contents: Vec<u8>, executable: bool },
    Symlink { target: String },
}

/// One archive member held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive
    pub name: String,
    pub data: EntryData,
}

/// Deterministic tar.gz under construction
///
/// Entries must be appended in name order. The archive only replaces
/// `target` once [`finish`](Self::finish) succeeds.
pub struct TarGzWriter {
    builder: Builder<GzEncoder<AtomicFile>>,
    target: PathBuf,
    mtime: u64,
    appended: usize,
}

impl TarGzWriter {
    pub fn create(target: &Path) -> Result<Self> {
        let file = AtomicFile::create(target)?;
        let encoder = GzBuilder::new().write(file, Compression::default());
        Ok(Self {
            builder: Builder::new(encoder),
            target: target.to_path_buf(),
            mtime: archive_mtime(),
            appended: 0,
        })
    }

    fn header(&self, entry_type: EntryType, mode: u32, size: u64) -> Header {
        let mut header = Header::new_gnu();
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(self.mtime);
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_size(size);
        header
    }

    /// Append a regular file of `size` bytes read from `data`
    pub fn append_file<R: Read>(
        &mut self,
        name: &str,
        size: u64,
        executable: bool,
        data: R,
    ) -> Result<()> {
        let mode = if executable { 0o755 } else { 0o644 };
        let mut header = self.header(EntryType::Regular, mode, size);
        self.builder
            .append_data(&mut header, name, data.take(size))?;
        self.appended += 1;
        Ok(())
    }

    pub fn append_symlink(&mut self, name: &str, target: &str) -> Result<()> {
        let mut header = self.header(EntryType::Symlink, 0o777, 0);
        self.builder.append_link(&mut header, name, target)?;
        self.appended += 1;
        Ok(())
    }

    /// Append a file or symlink from disk, streaming its contents
    pub fn append_path(&mut self, name: &str, path: &Path) -> Result<()> {
        let metadata = fs::symlink_metadata(path)?;
        if metadata.file_type().is_symlink() {
            let target = fs::read_link(path)?;
            return self.append_symlink(name, &target.to_string_lossy());
        }

        let file = File::open(path)?;
        let metadata = file.metadata()?;
        self.append_file(
            name,
            metadata.len(),
            filesystem::is_executable(&metadata),
            file,
        )
    }

    /// Re-emit an entry read from another archive under `name`
    pub fn append_entry_from<R: Read>(&mut self, name: &str, entry: Entry<'_, R>) -> Result<()> {
        let header = entry.header();
        match header.entry_type() {
            EntryType::Symlink => {
                let target = entry
                    .link_name()?
                    .map(|t| t.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.append_symlink(name, &target)
            }
            _ => {
                let size = header.size()?;
                let executable = header.mode()? & 0o111 != 0;
                self.append_file(name, size, executable, entry)
            }
        }
    }

    pub fn append_entry(&mut self, entry: &ArchiveEntry) -> Result<()> {
        match &entry.data {
            EntryData::File {
                contents,
                executable,
            } => self.append_file(
                &entry.name,
                contents.len() as u64,
                *executable,
                contents.as_slice(),
            ),
            EntryData::Symlink { target } => self.append_symlink(&entry.name, target),
        }
    }

    /// Close the stream and move the archive into place
    pub fn finish(self) -> Result<usize> {
        let encoder = self.builder.into_inner()?;
        let file = encoder.finish()?;
        file.commit(0o644)?;

        debug!("Wrote {} entries to {}", self.appended, self.target.display());
        Ok(self.appended)
    }
}

/// Write in-memory `entries` to `target` as a deterministic tar.gz
pub fn write_tar_gz(target: &Path, mut entries: Vec<ArchiveEntry>) -> Result<()> {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries.dedup_by(|a, b| a.name == b.name);

    let mut writer = TarGzWriter::create(target)?;
    for entry in &entries {
        writer.append_entry(entry)?;
    }
    writer.finish()?;
    Ok(())
}

pub fn open_tar_gz(path: &Path) -> Result<Archive<GzDecoder<File>>> {
    Ok(Archive::new(GzDecoder::new(File::open(path)?)))
}

/// Names of the entries of an archive, without keeping their contents
pub fn entry_names(path: &Path) -> Result<BTreeSet<String>> {
    let mut archive = open_tar_gz(path)?;
    let mut names = BTreeSet::new();
    for entry in archive.entries()? {
        names.insert(entry?.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Read the entries of an archive written by [`TarGzWriter`], keyed by name
pub fn read_tar_gz(path: &Path) -> Result<BTreeMap<String, ArchiveEntry>> {
    let mut archive = open_tar_gz(path)?;
    let mut entries = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();

        let data = match entry.header().entry_type() {
            EntryType::Regular => {
                let executable = entry.header().mode()? & 0o111 != 0;
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents)?;
                EntryData::File {
                    contents,
                    executable,
                }
            }
            EntryType::Symlink => EntryData::Symlink {
                target: entry
                    .link_name()?
                    .map(|t| t.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            },
            _ => continue,
        };

        entries.insert(name.clone(), ArchiveEntry { name, data });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file(name: &str, contents: &str) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            data: EntryData::File {
                contents: contents.as_bytes().to_vec(),
                executable: false,
            },
        }
    }

    #[test]
    fn test_write_is_deterministic_and_order_independent() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.tar.gz");
        let b = temp.path().join("b.tar.gz");

        write_tar_gz(&a, vec![file("x/1", "one"), file("x/2", "two")]).unwrap();
        write_tar_gz(&b, vec![file("x/2", "two"), file("x/1", "one")]).unwrap();

        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn test_read_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.tar.gz");
        let entries = vec![
            file("app/pom.xml", "<project/>"),
            ArchiveEntry {
                name: "app/bin/run".to_string(),
                data: EntryData::File {
                    contents: b"#!/bin/sh\n".to_vec(),
                    executable: true,
                },
            },
            ArchiveEntry {
                name: "app/lib/dep.jar".to_string(),
                data: EntryData::Symlink {
                    target: "../../kit/jars/dep.jar".to_string(),
                },
            },
        ];
        write_tar_gz(&path, entries.clone()).unwrap();

        let read = read_tar_gz(&path).unwrap();
        assert_eq!(read.len(), 3);
        for entry in &entries {
            assert_eq!(read.get(&entry.name), Some(entry));
        }
    }

    #[test]
    fn test_rewrite_from_read_entries_is_identical() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first.tar.gz");
        let second = temp.path().join("second.tar.gz");
        write_tar_gz(&first, vec![file("a", "1"), file("b", "22")]).unwrap();

        let entries = read_tar_gz(&first).unwrap().into_values().collect();
        write_tar_gz(&second, entries).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_streamed_path_matches_in_memory_entry() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("f");
        fs::write(&source, "data").unwrap();

        let streamed = temp.path().join("streamed.tar.gz");
        let mut writer = TarGzWriter::create(&streamed).unwrap();
        writer.append_path("pkg/f", &source).unwrap();
        assert_eq!(writer.finish().unwrap(), 1);

        let in_memory = temp.path().join("in-memory.tar.gz");
        write_tar_gz(&in_memory, vec![file("pkg/f", "data")]).unwrap();
        assert_eq!(fs::read(&streamed).unwrap(), fs::read(&in_memory).unwrap());
    }

    #[test]
    fn test_copied_entries_are_identical() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first.tar.gz");
        let second = temp.path().join("second.tar.gz");
        let link = ArchiveEntry {
            name: "b".to_string(),
            data: EntryData::Symlink {
                target: "a".to_string(),
            },
        };
        write_tar_gz(&first, vec![file("a", "1"), link]).unwrap();
        assert_eq!(
            entry_names(&first).unwrap().into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        let mut writer = TarGzWriter::create(&second).unwrap();
        let mut archive = open_tar_gz(&first).unwrap();
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            writer.append_entry_from(&name, entry).unwrap();
        }
        writer.finish().unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }
}
