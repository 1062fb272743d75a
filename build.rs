// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Common argument: package directory
fn dir_arg() -> Arg {
    Arg::new("dir").help("Package directory (default: current directory)")
}

/// Common argument: arguments passed through to a build tool
fn passthrough_arg(tool: &'static str) -> Arg {
    Arg::new("args")
        .num_args(0..)
        .trailing_var_arg(true)
        .allow_hyphen_values(true)
        .help(format!("Arguments passed to {tool}"))
}

fn build_cli() -> Command {
    Command::new("drydock")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Drydock Contributors")
        .about("Turn observed builds into kits, specs and build scripts")
        .subcommand_required(false)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug, -vvv trace)"),
        )
        .subcommand(
            Command::new("init")
                .about("Make a directory a drydock project")
                .arg(Arg::new("dir").help("Project directory (default: current directory)")),
        )
        .subcommand(Command::new("dry-run").about("Start observing changes to the project tree"))
        .subcommand(
            Command::new("mvn")
                .about("Run Maven from the kit against the kit repository")
                .arg(passthrough_arg("mvn")),
        )
        .subcommand(
            Command::new("ant")
                .about("Run Ant from the kit")
                .arg(passthrough_arg("ant")),
        )
        .subcommand(
            Command::new("finish")
                .about("End the dry run, keeping the changes")
                .arg(
                    Arg::new("abort")
                        .long("abort")
                        .action(ArgAction::SetTrue)
                        .help("Revert the project tree to its state at dry-run start"),
                ),
        )
        .subcommand(Command::new("status").about("Show whether a dry run is active"))
        .subcommand(
            Command::new("generate-kit-archive")
                .about("Archive the kit into output/kit/kit.tar.gz")
                .arg(
                    Arg::new("full")
                        .long("full")
                        .action(ArgAction::SetTrue)
                        .help("Rebuild every item instead of reusing unchanged ones"),
                ),
        )
        .subcommand(Command::new("generate-kit-spec").about("Generate the kit spec"))
        .subcommand(
            Command::new("generate-package-script")
                .about("Generate build.sh for a package from the shell history")
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("generate-package-archive")
                .about("Archive a package's sources")
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("generate-package-spec")
                .about("Generate a package spec")
                .arg(
                    Arg::new("filter")
                        .short('f')
                        .long("filter")
                        .help("Glob selecting the files listed in %files (default from config)"),
                )
                .arg(dir_arg())
                .arg(Arg::new("pom").help("POM seeding the header (default: <package>/pom.xml)")),
        )
        .subcommand(
            Command::new("generate-all")
                .about("Run every generator for the kit and a package")
                .arg(
                    Arg::new("full")
                        .long("full")
                        .action(ArgAction::SetTrue)
                        .help("Rebuild the whole kit archive"),
                )
                .arg(dir_arg()),
        )
        .subcommand(
            Command::new("purge-jars")
                .about("Move bundled jars from src/ into kit/jars/, leaving symlinks"),
        )
}

/// Render `man/drydock.1` next to the manifest
fn write_man_page(manifest_dir: &Path) -> io::Result<PathBuf> {
    let target = manifest_dir.join("man").join("drydock.1");
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut page = Vec::new();
    Man::new(build_cli()).render(&mut page)?;
    fs::write(&target, page)?;
    Ok(target)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let Some(manifest_dir) = env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from) else {
        println!("cargo:warning=no CARGO_MANIFEST_DIR, skipping man page");
        return;
    };
    if let Err(e) = write_man_page(&manifest_dir) {
        println!("cargo:warning=man page not generated: {e}");
    }
}
