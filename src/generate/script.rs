// src/generate/script.rs

//! Build script generation from shell history
//!
//! Commands typed during a dry run while inside a package directory are
//! replayed into `output/<package>/build.sh`. Kit tool invocations through
//! drydock are rewritten to call the kit executables directly, relative to
//! `$PROJECT_PREFIX`, so the script runs from an unpacked project anywhere.

use super::history::{read_history, select_session, HistoryEntry};
use super::{load_or_template, write_document, GenerationResult};
use crate::error::Result;
use crate::filesystem::path::{is_within, normalize, to_slash};
use crate::generate::managed::{Scope, Unit};
use crate::hash::sha256;
use crate::kit::Kit;
use crate::project::{Project, SRC_DIR};
use crate::runner::BuildTool;
use crate::transaction::DryRunSession;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shell variable holding the project root in generated scripts
pub const PREFIX_VAR: &str = "$PROJECT_PREFIX";

fn script_template(package: &str) -> String {
    format!(
        "\
#!/bin/bash
set -xe
PROJECT_PREFIX=\"${{PROJECT_PREFIX:-$(readlink -e .)}}\"
cd \"{PREFIX_VAR}/{SRC_DIR}/{package}\"
"
    )
}

/// Shell working-directory tracking over a command stream
struct DirTracker {
    cwd: PathBuf,
    previous: PathBuf,
    home: Option<PathBuf>,
}

impl DirTracker {
    fn new(start: &Path) -> Self {
        Self {
            cwd: start.to_path_buf(),
            previous: start.to_path_buf(),
            home: dirs::home_dir(),
        }
    }

    /// Apply `command` if it is a plain `cd`; returns whether it was one
    fn apply(&mut self, command: &str) -> bool {
        let mut words = command.split_whitespace();
        if words.next() != Some("cd") {
            return false;
        }
        let target = words.next().map(unquote).unwrap_or("");

        let next = match target {
            "" | "~" => match &self.home {
                Some(home) => home.clone(),
                None => return true,
            },
            "-" => self.previous.clone(),
            t if t.starts_with("~/") => match &self.home {
                Some(home) => home.join(&t[2..]),
                None => return true,
            },
            t => self.cwd.join(t),
        };

        self.previous = std::mem::replace(&mut self.cwd, normalize(next));
        true
    }
}

fn unquote(word: &str) -> &str {
    let stripped = word
        .strip_prefix('"')
        .and_then(|w| w.strip_suffix('"'))
        .or_else(|| word.strip_prefix('\'').and_then(|w| w.strip_suffix('\'')));
    stripped.unwrap_or(word)
}

/// Split a history line into the commands chained by `&&` or `;`
///
/// Separators inside quotes or escaped with `\` do not split.
fn split_commands(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '\\') => {
                chars.next();
            }
            (None, ';') => {
                parts.push(&line[start..i]);
                start = i + 1;
            }
            (None, '&') if chars.peek().is_some_and(|&(_, next)| next == '&') => {
                chars.next();
                parts.push(&line[start..i]);
                start = i + 2;
            }
            _ => {}
        }
    }
    parts.push(&line[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Turn the commands of a session into script lines
///
/// Chained commands are split apart first. Only commands run inside
/// `src/<package>/` are kept. A `cd` line is emitted whenever the directory
/// differs from the previous kept command's.
pub fn script_lines(
    project: &Project,
    package: &str,
    working_dir: &Path,
    commands: &[&HistoryEntry],
) -> Result<Vec<String>> {
    let root = project.root();
    let package_dir = project.src_dir().join(package);
    let ignored = &project.config().script.ignored_commands;

    let mut tracker = DirTracker::new(working_dir);
    let mut emitted_dir = package_dir.clone();
    let mut lines = Vec::new();

    for command in commands.iter().copied().flat_map(|e| split_commands(&e.command)) {
        if tracker.apply(command) || !is_within(&tracker.cwd, &package_dir) {
            continue;
        }

        let mut words = command.split_whitespace();
        let Some(program) = words.next() else {
            continue;
        };
        if ignored.iter().any(|c| c == program) {
            continue;
        }

        let line = if program == "drydock" {
            let Some(tool) = words.next().and_then(BuildTool::from_executable_name) else {
                debug!("Dropping drydock command: {}", command);
                continue;
            };
            rewrite_tool(project, tool, words.collect::<Vec<_>>())?
        } else {
            command.to_string()
        };

        if tracker.cwd != emitted_dir {
            let rel = tracker.cwd.strip_prefix(root).unwrap_or(&tracker.cwd);
            lines.push(format!("cd \"{PREFIX_VAR}/{}\"", to_slash(rel)));
            emitted_dir = tracker.cwd.clone();
        }
        lines.push(line);
    }

    Ok(lines)
}

fn rewrite_tool(project: &Project, tool: BuildTool, args: Vec<&str>) -> Result<String> {
    let executable = Kit::new(project).find_executable(tool.executable_name())?;
    let rel = executable.strip_prefix(project.root()).unwrap_or(&executable);

    let mut parts = vec![format!("\"{PREFIX_VAR}/{}\"", to_slash(rel))];
    parts.extend(tool.fixed_args(project, PREFIX_VAR));
    parts.extend(args.into_iter().map(str::to_string));
    Ok(parts.join(" "))
}

/// Managed units for script lines, keyed by content hash and occurrence
fn script_units(lines: &[String]) -> Vec<Unit> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    lines
        .iter()
        .map(|line| {
            let n = occurrences.entry(line.as_str()).or_default();
            *n += 1;
            let digest = sha256(line.as_bytes());
            Unit::new(&format!("cmd:{}:{}", &digest[..12], n), digest, line.clone())
        })
        .collect()
}

/// Generate `output/<package>/build.sh` from the shell history at
/// `history_file`
pub fn generate_build_script(
    project: &Project,
    session: &DryRunSession,
    package: &str,
    history_file: &Path,
) -> Result<GenerationResult> {
    project.package_dir(package)?;
    let target = project.package_output_dir(package).join("build.sh");

    let history = read_history(history_file)?;
    let commands = select_session(&history, session.started_at, Utc::now());
    let lines = script_lines(project, package, &session.working_dir, &commands)?;
    debug!(
        "{} of {} session commands kept for {}",
        lines.len(),
        commands.len(),
        package
    );

    let prior = load_or_template(&target, &script_template(package))?;
    let merged = prior.merge(
        &script_units(&lines),
        &Scope {
            key_prefix: "cmd:".to_string(),
            anchor: None,
        },
    );
    write_document(&target, &merged, 0o755)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::history::parse_history;
    use crate::transaction::DryRunController;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn entries(text: &str) -> Vec<HistoryEntry> {
        parse_history(text)
    }

    fn setup() -> (TempDir, Project) {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        fs::create_dir_all(temp.path().join("src/app/module")).unwrap();
        fs::create_dir_all(temp.path().join("kit/apache-maven/bin")).unwrap();
        fs::write(temp.path().join("kit/apache-maven/bin/mvn"), "#!/bin/sh\n").unwrap();
        (temp, project)
    }

    #[test]
    fn test_script_lines() {
        let (_temp, project) = setup();
        let history = entries(
            "cd src/app\nls\n./configure\ndrydock mvn -o package\ndrydock status\n\
             cd module\nmake\ncd -\nmake install\ncd ../..\nrm -rf output\n",
        );
        let commands: Vec<&HistoryEntry> = history.iter().collect();

        let lines = script_lines(&project, "app", project.root(), &commands).unwrap();
        assert_eq!(
            lines,
            vec![
                "./configure".to_string(),
                "\"$PROJECT_PREFIX/kit/apache-maven/bin/mvn\" \
                 -Dmaven.repo.local=$PROJECT_PREFIX/kit/m2 -o package"
                    .to_string(),
                "cd \"$PROJECT_PREFIX/src/app/module\"".to_string(),
                "make".to_string(),
                "cd \"$PROJECT_PREFIX/src/app\"".to_string(),
                "make install".to_string(),
            ]
        );
    }

    #[test]
    fn test_script_lines_absolute_cd() {
        let (_temp, project) = setup();
        let text = format!(
            "make outside\ncd {}/src/app/module\nmake\n",
            project.root().display()
        );
        let history = entries(&text);
        let commands: Vec<&HistoryEntry> = history.iter().collect();

        let lines = script_lines(&project, "app", Path::new("/"), &commands).unwrap();
        assert_eq!(
            lines,
            vec![
                "cd \"$PROJECT_PREFIX/src/app/module\"".to_string(),
                "make".to_string()
            ]
        );
    }

    #[test]
    fn test_split_commands() {
        assert_eq!(
            split_commands("cd src/app && mvn package; ls"),
            vec!["cd src/app", "mvn package", "ls"]
        );
        assert_eq!(
            split_commands("echo 'a && b; c' && make"),
            vec!["echo 'a && b; c'", "make"]
        );
        assert_eq!(split_commands("find . -exec rm {} \\;"), vec!["find . -exec rm {} \\;"]);
        assert_eq!(split_commands("make & wait"), vec!["make & wait"]);
        assert!(split_commands(" ; ").is_empty());
    }

    #[test]
    fn test_script_lines_chained_cd() {
        let (_temp, project) = setup();
        let history = entries("cd src/app && drydock mvn package
cd module; make
");
        let commands: Vec<&HistoryEntry> = history.iter().collect();

        let lines = script_lines(&project, "app", project.root(), &commands).unwrap();
        assert_eq!(
            lines,
            vec![
                "\"$PROJECT_PREFIX/kit/apache-maven/bin/mvn\" \
                 -Dmaven.repo.local=$PROJECT_PREFIX/kit/m2 package"
                    .to_string(),
                "cd \"$PROJECT_PREFIX/src/app/module\"".to_string(),
                "make".to_string(),
            ]
        );
    }

    #[test]
    fn test_script_units_repeated_commands() {
        let units = script_units(&["make".to_string(), "make".to_string()]);
        assert_ne!(units[0].key, units[1].key);
        assert!(units[0].key.ends_with(":1"));
        assert!(units[1].key.ends_with(":2"));
        assert_eq!(units[0].digest, units[1].digest);
    }

    #[test]
    fn test_generate_build_script() {
        let (temp, project) = setup();
        let controller = DryRunController::new(&project);
        controller.begin(project.root()).unwrap();
        let session = controller.require_session().unwrap();

        let history = temp.path().join("history");
        fs::write(&history, "drydock dry-run\ncd src/app\nmake\n").unwrap();

        let result = generate_build_script(&project, &session, "app", &history).unwrap();
        assert_eq!(result.path, project.root().join("output/app/build.sh"));
        assert_eq!(result.conflicts, 0);

        let text = fs::read_to_string(&result.path).unwrap();
        assert!(text.starts_with("#!/bin/bash\n"));
        assert!(text.contains("cd \"$PROJECT_PREFIX/src/app\"\n#@ auto cmd:"));
        assert!(text.ends_with("\nmake\n"));
        let mode = fs::metadata(&result.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        // A different session history leaves the old command as stale
        fs::write(&history, "drydock dry-run\ncd src/app\nmake all\n").unwrap();
        let result = generate_build_script(&project, &session, "app", &history).unwrap();
        assert_eq!(result.conflicts, 1);
        let text = fs::read_to_string(&result.path).unwrap();
        assert!(text.contains("# make\n"));
        assert!(text.ends_with("\nmake all\n"));
    }
}
