// src/commands/generate.rs

//! Generator commands
//!
//! Every generator needs an active dry run and holds the project lock while
//! it reads the diff and writes its artifact, so a concurrent `finish` either
//! waits or makes the generator report that no dry run is in progress.

use super::{open_project, print_generation_result, resolve_package};
use anyhow::{anyhow, Result};
use drydock::config::HISTFILE_ENV;
use drydock::{
    archive_kit, archive_package, generate_build_script, generate_kit_spec,
    generate_package_spec, ChangeSet, DryRunController, DryRunSession, KitArchiveResult, Project,
};
use std::path::{Path, PathBuf};

fn print_kit_archive(result: &KitArchiveResult) {
    println!(
        "{} generated ({} items, {} updated)",
        result.archive_path.display(),
        result.manifest.items.len(),
        result.manifest.updated.len()
    );
}

fn history_file(project: &Project) -> Result<PathBuf> {
    project.config().history_file().ok_or_else(|| {
        anyhow!("cannot locate the shell history file, set {}", HISTFILE_ENV)
    })
}

pub fn cmd_generate_kit_archive(full: bool) -> Result<()> {
    let (project, _cwd) = open_project()?;
    let _lock = project.lock()?;
    DryRunController::new(&project).require_session()?;

    print_kit_archive(&archive_kit(&project, full)?);
    Ok(())
}

pub fn cmd_generate_kit_spec() -> Result<()> {
    let (project, _cwd) = open_project()?;
    let _lock = project.lock()?;
    let session = DryRunController::new(&project).require_session()?;

    let changes = ChangeSet::compute(&project, &session)?;
    print_generation_result(&generate_kit_spec(&project, &changes)?);
    Ok(())
}

pub fn cmd_generate_package_script(dir: Option<&Path>) -> Result<()> {
    let (project, cwd) = open_project()?;
    let package = resolve_package(&project, dir, &cwd)?;
    let _lock = project.lock()?;
    let session = DryRunController::new(&project).require_session()?;

    let history = history_file(&project)?;
    print_generation_result(&generate_build_script(&project, &session, &package, &history)?);
    Ok(())
}

pub fn cmd_generate_package_archive(dir: Option<&Path>) -> Result<()> {
    let (project, cwd) = open_project()?;
    let package = resolve_package(&project, dir, &cwd)?;
    let _lock = project.lock()?;
    let session = DryRunController::new(&project).require_session()?;

    let changes = ChangeSet::compute(&project, &session)?;
    let path = archive_package(&project, &changes, &package)?;
    println!("{} generated", path.display());
    Ok(())
}

pub fn cmd_generate_package_spec(
    filter: Option<&str>,
    dir: Option<&Path>,
    pom: Option<&Path>,
) -> Result<()> {
    let (project, cwd) = open_project()?;
    let package = resolve_package(&project, dir, &cwd)?;
    let _lock = project.lock()?;
    let session = DryRunController::new(&project).require_session()?;

    let changes = ChangeSet::compute(&project, &session)?;
    print_generation_result(&generate_package_spec(
        &project, &changes, &package, pom, filter,
    )?);
    Ok(())
}

/// Run every generator for the kit and one package
pub fn cmd_generate_all(full: bool, dir: Option<&Path>) -> Result<()> {
    let (project, cwd) = open_project()?;
    let package = resolve_package(&project, dir, &cwd)?;
    let _lock = project.lock()?;
    let session = DryRunController::new(&project).require_session()?;

    generate_everything(&project, &session, &package, full)
}

fn generate_everything(
    project: &Project,
    session: &DryRunSession,
    package: &str,
    full: bool,
) -> Result<()> {
    print_kit_archive(&archive_kit(project, full)?);

    let changes = ChangeSet::compute(project, session)?;
    print_generation_result(&generate_kit_spec(project, &changes)?);

    let history = history_file(project)?;
    print_generation_result(&generate_build_script(project, session, package, &history)?);

    let path = archive_package(project, &changes, package)?;
    println!("{} generated", path.display());

    print_generation_result(&generate_package_spec(project, &changes, package, None, None)?);
    Ok(())
}
