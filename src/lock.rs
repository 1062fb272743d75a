// src/lock.rs

//! Advisory lock serializing drydock commands within one project
//!
//! Beginning or finishing a dry run and generating artifacts all hold
//! `.drydock/lock` until they return. A generator therefore never reads a
//! tree that a concurrent `finish --abort` is reverting.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Tries before reporting the project as busy
const LOCK_ATTEMPTS: u32 = 5;
/// First pause between tries, doubled after each one
const FIRST_BACKOFF: Duration = Duration::from_millis(100);

/// Held project lock, released when dropped
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        let mut backoff = FIRST_BACKOFF;
        let mut attempt = 1;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if attempt >= LOCK_ATTEMPTS => return Err(busy(&path, e)),
                Err(_) => {
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }

        debug!("Locked {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn busy(path: &Path, cause: io::Error) -> Error {
    Error::IoError(format!(
        "another drydock command holds {} ({} tries): {}",
        path.display(),
        LOCK_ATTEMPTS,
        cause
    ))
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Could not unlock {}: {}", self.path.display(), e);
        }
    }
}
