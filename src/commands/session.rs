// src/commands/session.rs

//! Project and dry-run session commands

use super::open_project;
use anyhow::Result;
use drydock::{DryRunController, DryRunState, Error, FinishOutcome, Project};
use std::env;
use std::path::Path;
use tracing::info;

/// Initialize a project in `dir` (default: current directory)
pub fn cmd_init(dir: Option<&Path>) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir()?,
    };
    info!("Initializing drydock project in {}", dir.display());

    let project = Project::init(&dir)?;
    println!("Initialized drydock project in {}", project.root().display());
    println!("\nPut sources under src/<package>/ and start a build with 'drydock dry-run'.");
    Ok(())
}

/// Begin a dry run
pub fn cmd_dry_run() -> Result<()> {
    let (project, cwd) = open_project()?;
    let controller = DryRunController::new(&project);

    if !controller.begin(&cwd)? {
        println!("A dry-run is already in progress.");
        println!("\nUse 'drydock finish' to keep its changes or 'drydock finish --abort' to revert them.");
        return Ok(());
    }

    println!("Dry run started. Changes to {} are now observed.", project.root().display());
    Ok(())
}

/// End the dry run, optionally reverting the tree
pub fn cmd_finish(abort: bool) -> Result<()> {
    let (project, _cwd) = open_project()?;

    match DryRunController::new(&project).finish(abort)? {
        None => Err(Error::NoDryRun.into()),
        Some(FinishOutcome::Committed) => {
            println!("Dry run finished, changes kept.");
            Ok(())
        }
        Some(FinishOutcome::Aborted) => {
            println!("Dry run aborted, project restored.");
            Ok(())
        }
    }
}

/// Show the dry-run state
pub fn cmd_status() -> Result<()> {
    let (project, _cwd) = open_project()?;
    println!("Project: {}", project.root().display());

    match DryRunController::new(&project).state()? {
        DryRunState::Idle => println!("No dry-run in progress."),
        DryRunState::DryRunning(session) => {
            println!("Dry run in progress");
            println!("  Baseline:    {}", session.baseline.short());
            println!(
                "  Started:     {}",
                session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Started in:  {}", session.working_dir.display());
        }
        DryRunState::Corrupt(reason) => {
            println!("Dry-run marker is corrupt: {}", reason);
            println!("\nUse 'drydock finish' to clear it.");
        }
    }
    Ok(())
}
