// src/diff/classifier.rs

//! Path-to-category classification
//!
//! Categories come from an ordered rule table; the first rule whose glob
//! matches the path, or one of the directories containing it, wins. Paths
//! matching no rule are [`Category::Other`].

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// What part of the project a changed path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Package sources under `src/`
    Source,
    /// Binary dependencies under `kit/`
    KitBinary,
    /// Build outputs and drydock artifacts
    Generated,
    /// Anything else
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::KitBinary => "kit-binary",
            Self::Generated => "generated",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category rules, most specific first
pub const CATEGORY_RULES: &[(&str, Category)] = &[
    ("kit", Category::KitBinary),
    ("output", Category::Generated),
    ("src/**/target", Category::Generated),
    ("src/**/build", Category::Generated),
    ("src/**/dist", Category::Generated),
    ("src", Category::Source),
];

/// Glob options shared by every path rule: `*` never crosses a `/`
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

static COMPILED_RULES: LazyLock<Vec<(Pattern, Category)>> = LazyLock::new(|| {
    CATEGORY_RULES
        .iter()
        .filter_map(|(glob, category)| Pattern::new(glob).ok().map(|p| (p, *category)))
        .collect()
});

/// True if `pattern` matches `path` or any of its ancestors
pub fn matches_path_or_parent(pattern: &Pattern, path: &Path) -> bool {
    path.ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| pattern.matches_path_with(p, MATCH_OPTIONS))
}

/// Classifies project-relative paths into categories
pub struct PathClassifier;

impl PathClassifier {
    /// Classify a project-relative path
    pub fn classify(path: &Path) -> Category {
        COMPILED_RULES
            .iter()
            .find(|(pattern, _)| matches_path_or_parent(pattern, path))
            .map(|(_, category)| *category)
            .unwrap_or(Category::Other)
    }
}
