// src/runner.rs

//! Running build tools from the kit
//!
//! Builds use the executables shipped in `kit/` rather than whatever is on
//! `PATH`, and Maven is pointed at the kit's repository so every downloaded
//! artifact lands where the kit archive will pick it up.

use crate::error::{Error, Result};
use crate::kit::Kit;
use crate::project::{Project, KIT_DIR};
use crate::transaction::DryRunSession;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::info;

/// Name of the Maven settings file looked up in the kit repository
pub const MAVEN_SETTINGS: &str = "settings.xml";

/// Build tool a kit can provide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTool {
    Maven,
    Ant,
}

impl BuildTool {
    pub fn executable_name(&self) -> &'static str {
        match self {
            Self::Maven => "mvn",
            Self::Ant => "ant",
        }
    }

    pub fn from_executable_name(name: &str) -> Option<Self> {
        match name {
            "mvn" => Some(Self::Maven),
            "ant" => Some(Self::Ant),
            _ => None,
        }
    }

    /// Arguments passed before the user's, with project paths rooted at
    /// `root`
    ///
    /// `root` is either the project root or a shell expression standing for
    /// it, such as `$PROJECT_PREFIX`.
    pub fn fixed_args(&self, project: &Project, root: &str) -> Vec<String> {
        match self {
            Self::Maven => {
                let repo = format!("{KIT_DIR}/{}", project.config().kit.maven_repository);
                let mut args = vec![format!("-Dmaven.repo.local={root}/{repo}")];
                if project.maven_repository_dir().join(MAVEN_SETTINGS).is_file() {
                    args.push("-s".to_string());
                    args.push(format!("{root}/{repo}/{MAVEN_SETTINGS}"));
                }
                args
            }
            Self::Ant => Vec::new(),
        }
    }
}

impl fmt::Display for BuildTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable_name())
    }
}

/// Runs kit build tools for a project
pub struct KitRunner<'a> {
    project: &'a Project,
}

impl<'a> KitRunner<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self { project }
    }

    /// Executable and full argument list for running `tool` with `args`
    pub fn command_line(&self, tool: BuildTool, args: &[String]) -> Result<(PathBuf, Vec<String>)> {
        let executable = Kit::new(self.project).find_executable(tool.executable_name())?;
        let root = self.project.root().to_string_lossy().into_owned();
        let mut full = tool.fixed_args(self.project, &root);
        full.extend(args.iter().cloned());
        Ok((executable, full))
    }

    /// Run `tool` in `cwd`, waiting for it to exit
    ///
    /// Requires the session of the dry run observing the build.
    pub fn run(
        &self,
        _session: &DryRunSession,
        tool: BuildTool,
        args: &[String],
        cwd: &Path,
    ) -> Result<ExitStatus> {
        let (executable, full) = self.command_line(tool, args)?;
        info!("Running {} {}", executable.display(), full.join(" "));

        let status = Command::new(&executable)
            .args(&full)
            .current_dir(cwd)
            .status()
            .map_err(|e| {
                Error::IoError(format!("Failed to run {}: {}", executable.display(), e))
            })?;

        info!("{} exited with {}", tool, status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::DryRunController;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn install_tool(root: &Path, rel: &str, script: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_maven_command_line() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        install_tool(temp.path(), "kit/apache-maven-3.9.6/bin/mvn", "#!/bin/sh\n");

        let runner = KitRunner::new(&project);
        let (exe, args) = runner
            .command_line(BuildTool::Maven, &["package".to_string()])
            .unwrap();
        assert_eq!(exe, project.root().join("kit/apache-maven-3.9.6/bin/mvn"));
        assert_eq!(
            args,
            vec![
                format!("-Dmaven.repo.local={}/kit/m2", project.root().display()),
                "package".to_string()
            ]
        );

        fs::write(project.root().join("kit/m2/settings.xml"), "<settings/>").unwrap();
        assert_eq!(
            BuildTool::Maven.fixed_args(&project, "$PROJECT_PREFIX"),
            vec![
                "-Dmaven.repo.local=$PROJECT_PREFIX/kit/m2".to_string(),
                "-s".to_string(),
                "$PROJECT_PREFIX/kit/m2/settings.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_executable() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        let result = KitRunner::new(&project).command_line(BuildTool::Ant, &[]);
        assert!(matches!(result, Err(Error::ExecutableNotFound(name)) if name == "ant"));
    }

    #[test]
    fn test_run_ant() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        install_tool(
            temp.path(),
            "kit/apache-ant/bin/ant",
            "#!/bin/sh\necho \"$@\" > ant.out\n",
        );
        fs::create_dir_all(temp.path().join("src/app")).unwrap();

        let controller = DryRunController::new(&project);
        controller.begin(project.root()).unwrap();
        let session = controller.require_session().unwrap();

        let cwd = project.root().join("src/app");
        let status = KitRunner::new(&project)
            .run(&session, BuildTool::Ant, &["jar".to_string()], &cwd)
            .unwrap();
        assert!(status.success());
        assert_eq!(fs::read_to_string(cwd.join("ant.out")).unwrap(), "jar\n");
    }
}
