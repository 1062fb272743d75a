// src/diff/ignore.rs

//! Paths excluded from observation
//!
//! Version-control metadata, drydock's own state directory and editor
//! scratch files never show up in a change list, never get snapshotted and
//! survive a revert untouched.

use super::classifier::{matches_path_or_parent, MATCH_OPTIONS};
use crate::error::Result;
use glob::Pattern;
use std::path::{Component, Path};

/// Top-level directory holding drydock's own state
pub const STATE_DIR: &str = ".drydock";

/// Editor swap, backup and lock files, matched against file names
pub const EDITOR_PATTERNS: &[&str] = &["*.swp", "*.swo", "*~", ".#*", "#*#"];

/// Compiled ignore rules for one project
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    editor: Vec<Pattern>,
    extra: Vec<Pattern>,
}

impl IgnoreRules {
    /// Built-in rules plus extra globs from configuration
    ///
    /// An extra glob containing `/` is matched against the project-relative
    /// path (and its parent directories); one without is matched against
    /// each path component's name.
    pub fn new(extra: &[String]) -> Result<Self> {
        let editor = EDITOR_PATTERNS
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let extra = extra
            .iter()
            .map(|p| Pattern::new(p.trim_start_matches('/')))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { editor, extra })
    }

    /// True if a project-relative path must not be observed
    pub fn is_ignored(&self, path: &Path) -> bool {
        let names: Vec<&str> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        if names.first() == Some(&STATE_DIR) || names.contains(&".git") {
            return true;
        }

        if let Some(file_name) = names.last()
            && self.editor.iter().any(|p| p.matches_with(file_name, MATCH_OPTIONS))
        {
            return true;
        }

        self.extra.iter().any(|pattern| {
            if pattern.as_str().contains('/') {
                matches_path_or_parent(pattern, path)
            } else {
                names.iter().any(|n| pattern.matches_with(n, MATCH_OPTIONS))
            }
        })
    }

    /// The same rules in gitignore syntax, for the history's `info/exclude`
    pub fn exclude_file(&self) -> String {
        let mut out = String::from("# managed by drydock\n");
        out.push_str(&format!("/{STATE_DIR}/\n"));
        out.push_str(".git/\n");
        for pattern in &self.editor {
            out.push_str(&escape_gitignore(pattern.as_str()));
            out.push('\n');
        }
        for pattern in &self.extra {
            let text = pattern.as_str();
            if text.contains('/') {
                out.push('/');
            }
            out.push_str(&escape_gitignore(text));
            out.push('\n');
        }
        out
    }
}

fn escape_gitignore(pattern: &str) -> String {
    if pattern.starts_with('#') || pattern.starts_with('!') {
        format!("\\{pattern}")
    } else {
        pattern.to_string()
    }
}
