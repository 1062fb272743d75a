// src/cli/mod.rs
//! CLI definitions for drydock
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! Session commands:
//! - `dry-run` / `finish` - Bracket an observed build
//! - `mvn` / `ant` - Run a kit build tool inside the dry run
//!
//! Generators (need an active dry run):
//! - `generate-kit-archive`, `generate-kit-spec`
//! - `generate-package-archive`, `generate-package-spec`, `generate-package-script`
//! - `generate-all`

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "drydock")]
#[command(author = "Drydock Contributors")]
#[command(version)]
#[command(about = "Turn observed builds into kits, specs and build scripts", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // =========================================================================
    // Project and session
    // =========================================================================
    /// Make a directory a drydock project
    Init {
        /// Project directory (default: current directory)
        dir: Option<PathBuf>,
    },

    /// Start observing changes to the project tree
    DryRun,

    /// Run Maven from the kit against the kit repository
    Mvn {
        /// Arguments passed to mvn
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run Ant from the kit
    Ant {
        /// Arguments passed to ant
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// End the dry run, keeping the changes
    Finish {
        /// Revert the project tree to its state at dry-run start
        #[arg(long)]
        abort: bool,
    },

    /// Show whether a dry run is active
    Status,

    // =========================================================================
    // Generators
    // =========================================================================
    /// Archive the kit into output/kit/kit.tar.gz
    GenerateKitArchive {
        /// Rebuild every item instead of reusing unchanged ones
        #[arg(long)]
        full: bool,
    },

    /// Generate the kit spec
    GenerateKitSpec,

    /// Generate build.sh for a package from the shell history
    GeneratePackageScript {
        /// Package directory (default: current directory)
        dir: Option<PathBuf>,
    },

    /// Archive a package's sources
    GeneratePackageArchive {
        /// Package directory (default: current directory)
        dir: Option<PathBuf>,
    },

    /// Generate a package spec
    GeneratePackageSpec {
        /// Glob selecting the files listed in %files (default from config)
        #[arg(short, long)]
        filter: Option<String>,

        /// Package directory (default: current directory)
        dir: Option<PathBuf>,

        /// POM seeding the header (default: <package>/pom.xml)
        pom: Option<PathBuf>,
    },

    /// Run every generator for the kit and a package
    GenerateAll {
        /// Rebuild the whole kit archive
        #[arg(long)]
        full: bool,

        /// Package directory (default: current directory)
        dir: Option<PathBuf>,
    },

    // =========================================================================
    // Maintenance
    // =========================================================================
    /// Move bundled jars from src/ into kit/jars/, leaving symlinks
    PurgeJars,
}
