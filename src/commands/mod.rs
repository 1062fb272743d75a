// src/commands/mod.rs
//! Command handlers for the drydock CLI

mod generate;
mod purge;
mod session;
mod tools;

pub use generate::{
    cmd_generate_all, cmd_generate_kit_archive, cmd_generate_kit_spec,
    cmd_generate_package_archive, cmd_generate_package_script, cmd_generate_package_spec,
};
pub use purge::cmd_purge_jars;
pub use session::{cmd_dry_run, cmd_finish, cmd_init, cmd_status};
pub use tools::cmd_build_tool;

use anyhow::Result;
use drydock::{GenerationResult, Project};
use std::env;
use std::path::{Path, PathBuf};

/// Find the project containing the current directory
pub(crate) fn open_project() -> Result<(Project, PathBuf)> {
    let cwd = env::current_dir()?;
    let project = Project::find(&cwd)?;
    Ok((project, cwd))
}

/// Package named by `dir`, or by the current directory
pub(crate) fn resolve_package(project: &Project, dir: Option<&Path>, cwd: &Path) -> Result<String> {
    let dir = dir.unwrap_or(cwd);
    Ok(project.package_name_for(dir)?)
}

/// Report a generated artifact and its unresolved conflicts
pub(crate) fn print_generation_result(result: &GenerationResult) {
    println!("{} generated", result.path.display());
    if result.conflicts > 0 {
        println!(
            "Warning: {} unresolved conflict{} in {}",
            result.conflicts,
            if result.conflicts == 1 { "" } else { "s" },
            result.path.display()
        );
    }
}
