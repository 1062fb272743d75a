// src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use drydock::{BuildTool, Error};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the `-v` log level
const LOG_ENV: &str = "DRYDOCK_LOG";

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Instruction shown for a state-precondition violation
fn instruction(err: &Error) -> String {
    match err {
        Error::NoDryRun => {
            "No dry-run in progress.\n\nStart one with 'drydock dry-run'.".to_string()
        }
        Error::DryRunInProgress => "A dry-run is in progress.\n\n\
             End it with 'drydock finish' or 'drydock finish --abort'."
            .to_string(),
        other => format!("{}.", capitalize(&other.to_string())),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Some(command) = cli.command else {
        println!("drydock {}", env!("CARGO_PKG_VERSION"));
        println!("Run 'drydock --help' for usage information");
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Init { dir } => commands::cmd_init(dir.as_deref())?,
        Commands::DryRun => commands::cmd_dry_run()?,
        Commands::Mvn { args } => return commands::cmd_build_tool(BuildTool::Maven, &args),
        Commands::Ant { args } => return commands::cmd_build_tool(BuildTool::Ant, &args),
        Commands::Finish { abort } => commands::cmd_finish(abort)?,
        Commands::Status => commands::cmd_status()?,
        Commands::GenerateKitArchive { full } => commands::cmd_generate_kit_archive(full)?,
        Commands::GenerateKitSpec => commands::cmd_generate_kit_spec()?,
        Commands::GeneratePackageScript { dir } => {
            commands::cmd_generate_package_script(dir.as_deref())?
        }
        Commands::GeneratePackageArchive { dir } => {
            commands::cmd_generate_package_archive(dir.as_deref())?
        }
        Commands::GeneratePackageSpec { filter, dir, pom } => {
            commands::cmd_generate_package_spec(filter.as_deref(), dir.as_deref(), pom.as_deref())?
        }
        Commands::GenerateAll { full, dir } => commands::cmd_generate_all(full, dir.as_deref())?,
        Commands::PurgeJars => commands::cmd_purge_jars()?,
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            // State preconditions are instructions, not failures
            if let Some(e) = err.downcast_ref::<Error>()
                && e.is_precondition()
            {
                println!("{}", instruction(e));
                return ExitCode::SUCCESS;
            }
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
