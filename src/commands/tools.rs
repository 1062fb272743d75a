// src/commands/tools.rs

//! Kit build tool commands

use super::open_project;
use anyhow::Result;
use drydock::{BuildTool, DryRunController, KitRunner};
use std::process::ExitCode;

/// Run a kit build tool in the current directory during a dry run
///
/// The tool's exit code becomes drydock's.
pub fn cmd_build_tool(tool: BuildTool, args: &[String]) -> Result<ExitCode> {
    let (project, cwd) = open_project()?;
    let session = DryRunController::new(&project).require_session()?;

    let status = KitRunner::new(&project).run(&session, tool, args, &cwd)?;
    if status.success() {
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("{} failed: {}", tool, status);
    Ok(match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    })
}
