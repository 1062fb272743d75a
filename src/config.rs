// src/config.rs

//! Project configuration
//!
//! Stored as `.drydock/config.toml`. Every field has a default, so a missing
//! file or a partial one is valid.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable that overrides the shell history location
pub const HISTFILE_ENV: &str = "DRYDOCK_HISTFILE";

/// Top-level project configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub kit: KitConfig,

    #[serde(default)]
    pub spec: SpecConfig,

    #[serde(default)]
    pub script: ScriptConfig,

    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Binary dependency kit layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitConfig {
    /// Directory under `kit/` holding a Maven repository
    #[serde(default = "default_maven_repository")]
    pub maven_repository: String,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            maven_repository: default_maven_repository(),
        }
    }
}

fn default_maven_repository() -> String {
    "m2".to_string()
}

/// Spec generation defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecConfig {
    /// Glob applied to file names when listing a package's `%files`
    #[serde(default = "default_filter")]
    pub default_filter: String,
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            default_filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "*.jar".to_string()
}

/// Build script capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Shell history to read instead of `$HISTFILE` or `~/.bash_history`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,

    /// Commands never copied into build scripts
    #[serde(default = "default_ignored_commands")]
    pub ignored_commands: Vec<String>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            ignored_commands: default_ignored_commands(),
        }
    }
}

fn default_ignored_commands() -> Vec<String> {
    [
        "ls", "ll", "cat", "less", "more", "head", "tail", "pwd", "clear", "history", "echo",
        "vi", "vim", "nano", "emacs", "man", "exit", "find", "grep", "git", "tree",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Extra paths excluded from observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Globs matched against project-relative paths and file names
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl ProjectConfig {
    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Shell history file to read for build scripts
    ///
    /// Resolution order: `DRYDOCK_HISTFILE`, `script.history_file`,
    /// `HISTFILE`, then `~/.bash_history`.
    pub fn history_file(&self) -> Option<PathBuf> {
        self.history_file_with(|name| std::env::var_os(name).map(PathBuf::from))
    }

    fn history_file_with(&self, env: impl Fn(&str) -> Option<PathBuf>) -> Option<PathBuf> {
        env(HISTFILE_ENV)
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.script.history_file.clone())
            .or_else(|| env("HISTFILE").filter(|p| !p.as_os_str().is_empty()))
            .or_else(|| dirs::home_dir().map(|home| home.join(".bash_history")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ProjectConfig::load(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.kit.maven_repository, "m2");
        assert_eq!(config.spec.default_filter, "*.jar");
    }

    #[test]
    fn test_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[kit]\nmaven_repository = \"repository\"\n\n[ignore]\npatterns = [\"*.log\"]\n",
        )
        .unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.kit.maven_repository, "repository");
        assert_eq!(config.ignore.patterns, vec!["*.log".to_string()]);
        assert_eq!(config.spec.default_filter, "*.jar");
        assert!(config.script.ignored_commands.contains(&"ls".to_string()));
    }

    #[test]
    fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let mut config = ProjectConfig::default();
        config.script.history_file = Some(PathBuf::from("/tmp/history"));
        fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(ProjectConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[kit\n").unwrap();
        assert!(matches!(
            ProjectConfig::load(&path),
            Err(crate::Error::Toml(_))
        ));
    }

    #[test]
    fn test_history_resolution_order() {
        let mut config = ProjectConfig::default();

        let env = |name: &str| match name {
            HISTFILE_ENV => Some(PathBuf::from("/override")),
            "HISTFILE" => Some(PathBuf::from("/shell")),
            _ => None,
        };
        assert_eq!(config.history_file_with(env), Some(PathBuf::from("/override")));

        config.script.history_file = Some(PathBuf::from("/configured"));
        let env = |name: &str| match name {
            "HISTFILE" => Some(PathBuf::from("/shell")),
            _ => None,
        };
        assert_eq!(config.history_file_with(env), Some(PathBuf::from("/configured")));

        config.script.history_file = None;
        assert_eq!(config.history_file_with(env), Some(PathBuf::from("/shell")));
    }
}
