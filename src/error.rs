// src/error.rs

//! Error types for drydock
//!
//! Domain failures get their own variants so the command layer can turn each
//! one into a specific message. OS-level failures are wrapped and keep their
//! native message.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the drydock library
#[derive(Error, Debug)]
pub enum Error {
    /// No `.drydock` directory in the given directory or any ancestor
    #[error("{} is not a drydock project directory, see drydock init", .0.display())]
    NoProjectDirectory(PathBuf),

    /// The directory is not `src/<name>` (or below) inside the project, or it
    /// does not exist; also reported for a missing `kit/` when archiving
    #[error("{} is not a drydock package directory", .0.display())]
    NoPackageDirectory(PathBuf),

    /// `init` was run on a directory that already has a snapshot history
    #[error("{} is already a drydock project", .0.display())]
    AlreadyInitialized(PathBuf),

    /// A build tool executable could not be found in the kit
    #[error("executable {0} not found in kit/ or any of its subdirectories")]
    ExecutableNotFound(String),

    /// The operation needs an active dry run
    #[error("no dry-run in progress")]
    NoDryRun,

    /// The operation needs the project to be idle
    #[error("a dry-run is in progress")]
    DryRunInProgress,

    /// The session marker exists but cannot be understood
    #[error("dry-run marker {} is corrupt: {reason}", .path.display())]
    CorruptSession { path: PathBuf, reason: String },

    /// Lock acquisition or other I/O failure described by a message
    #[error("I/O error: {0}")]
    IoError(String),

    /// Malformed input (history, POM, marker, manifest)
    #[error("parse error: {0}")]
    ParseError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("snapshot history error: {0}")]
    Git(#[from] git2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// True for state-precondition violations, which are reported as instructions
    /// rather than failures
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoDryRun | Self::DryRunInProgress | Self::AlreadyInitialized(_)
        )
    }
}

/// Result type alias using drydock's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(Error::NoDryRun.is_precondition());
        assert!(Error::DryRunInProgress.is_precondition());
        assert!(Error::AlreadyInitialized(PathBuf::from("/p")).is_precondition());
        assert!(!Error::NoProjectDirectory(PathBuf::from("/p")).is_precondition());
        assert!(!Error::ExecutableNotFound("mvn".to_string()).is_precondition());
    }

    #[test]
    fn test_messages() {
        let err = Error::NoPackageDirectory(PathBuf::from("/p/src"));
        assert_eq!(err.to_string(), "/p/src is not a drydock package directory");

        let err = Error::ExecutableNotFound("ant".to_string());
        assert!(err.to_string().contains("ant"));
    }
}
