// src/lib.rs

//! Drydock: packaging from observed builds
//!
//! Drydock watches what an opaque build tool (Maven, Ant, a configure
//! script) does to a project tree and turns the difference into packaging
//! artifacts: a kit archive of binary dependencies, source archives, RPM
//! specs and replayable build scripts.
//!
//! # Architecture
//!
//! - Snapshots: the project tree is recorded in a bare git repository whose
//!   work tree is the project root
//! - Dry runs: a session marker brackets the build; finishing either keeps
//!   the result or reverts the tree to the baseline snapshot
//! - Change sets: diffs against the baseline, classified by path
//! - Generators: merge freshly derived lines into previously generated
//!   artifacts, keeping hand edits and reporting conflicts

pub mod archive;
pub mod config;
pub mod diff;
mod error;
pub mod filesystem;
pub mod generate;
pub mod hash;
pub mod kit;
pub mod lock;
pub mod pom;
pub mod project;
pub mod purge;
pub mod runner;
pub mod snapshot;
pub mod transaction;

pub use archive::{archive_kit, archive_package, KitArchiveResult, KitManifest};
pub use config::ProjectConfig;
pub use diff::{Category, ChangeEntry, ChangeKind, ChangeSet, IgnoreRules, PathClassifier};
pub use error::{Error, Result};
pub use generate::{
    generate_build_script, generate_kit_spec, generate_package_spec, GenerationResult,
};
pub use hash::{HashAlgorithm, Hasher};
pub use kit::{Kit, KitItem};
pub use pom::Pom;
pub use project::Project;
pub use purge::{purge_jars, PurgedJar};
pub use runner::{BuildTool, KitRunner};
pub use snapshot::{SnapshotId, SnapshotStore};
pub use transaction::{DryRunController, DryRunSession, DryRunState, FinishOutcome};
