// src/filesystem/atomic.rs

//! All-or-nothing file replacement
//!
//! Every artifact drydock produces is written to a temporary file in the
//! destination directory and renamed over the target, so a crash mid-write
//! leaves either the previous artifact or the new one, never a torn file.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Temporary sibling of a target file, committed by [`AtomicFile::commit`]
///
/// Dropping without committing discards the temporary file.
pub struct AtomicFile {
    temp: NamedTempFile,
    target: std::path::PathBuf,
}

impl AtomicFile {
    /// Create the temporary file next to `target`, creating parent directories
    pub fn create(target: &Path) -> Result<Self> {
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let temp = tempfile::Builder::new()
            .prefix(".drydock-")
            .suffix(".tmp")
            .tempfile_in(parent)?;

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Writer for the temporary file
    pub fn file(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    /// Flush, apply `mode` and rename over the target
    pub fn commit(self, mode: u32) -> Result<()> {
        let file = self.temp.as_file();
        file.set_permissions(fs::Permissions::from_mode(mode))?;
        file.sync_all()?;

        self.temp
            .persist(&self.target)
            .map_err(|e| Error::Io(e.error))?;

        debug!("Wrote {}", self.target.display());
        Ok(())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}

/// Replace `target` with `contents` atomically
pub fn write_atomic(target: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut file = AtomicFile::create(target)?;
    file.write_all(contents)?;
    file.commit(mode)
}

/// Move a file atomically, falling back to copy+fsync+delete for cross-filesystem moves
///
/// `rename()` fails with EXDEV when source and destination are on
/// different mount points.
pub fn move_file_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            debug!(
                "Cross-filesystem move ({} -> {}), copying",
                src.display(),
                dst.display()
            );

            fs::copy(src, dst)?;
            File::open(dst)?.sync_all()?;

            if let Some(parent) = dst.parent()
                && let Ok(dir) = File::open(parent)
            {
                // Not every filesystem supports fsync on directories
                let _ = dir.sync_all();
            }

            fs::remove_file(src)
        }
        Err(e) => Err(e),
    }
}
