// src/commands/purge.rs

//! Jar purging command

use super::open_project;
use anyhow::Result;
use drydock::{purge_jars, DryRunController};

/// Move bundled jars out of src/ while no dry run is active
pub fn cmd_purge_jars() -> Result<()> {
    let (project, _cwd) = open_project()?;
    let _lock = project.lock()?;
    DryRunController::new(&project).require_idle()?;

    let purged = purge_jars(&project)?;
    if purged.is_empty() {
        println!("No jars found under src/.");
        return Ok(());
    }

    for jar in &purged {
        let note = if jar.reused { " (already in kit)" } else { "" };
        println!("  {} -> {}{}", jar.source, jar.destination, note);
    }
    println!("Moved {} jar{} into the kit.", purged.len(), if purged.len() == 1 { "" } else { "s" });
    Ok(())
}
