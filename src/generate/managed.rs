// src/generate/managed.rs

//! Managed-line format shared by generated specs and scripts
//!
//! A generated artifact mixes lines drydock owns with lines a human wrote.
//! Owned lines come in two-line units, so the artifact stays a valid spec or
//! shell script:
//!
//! ```text
//! #@ auto <key> <digest>                 auto-generated unit
//! <content>
//! #@ conflict <stale|changed> <key> <digest>
//! # <old content>                        retained line needing attention
//! ```
//!
//! Every other line is human-owned and never rewritten. The digest records
//! the derived value a unit was generated from (file content, command text),
//! so regeneration can tell an unchanged source from a changed one even when
//! the content line was edited by hand.

use crate::hash::sha256;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

const AUTO_TAG: &str = "#@ auto ";
const CONFLICT_TAG: &str = "#@ conflict ";

/// Why a unit is in conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// The unit's source no longer exists
    Stale,
    /// The unit's source changed; the new unit follows
    Changed,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stale => "stale",
            Self::Changed => "changed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "stale" => Some(Self::Stale),
            "changed" => Some(Self::Changed),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical line of a managed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Human(String),
    Auto {
        key: String,
        digest: String,
        content: String,
    },
    Conflict {
        kind: ConflictKind,
        key: String,
        digest: String,
        /// Content of the unit when it was set aside, without the `# ` prefix
        content: String,
    },
}

impl Line {
    pub fn auto(unit: &Unit) -> Self {
        Self::Auto {
            key: unit.key.clone(),
            digest: unit.digest.clone(),
            content: unit.content.clone(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Human(_) => None,
            Self::Auto { key, .. } | Self::Conflict { key, .. } => Some(key),
        }
    }
}

/// A freshly derived auto unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub key: String,
    pub digest: String,
    pub content: String,
}

impl Unit {
    /// Build a unit, encoding `raw_key` so it contains no whitespace
    pub fn new(raw_key: &str, digest: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: encode_key(raw_key),
            digest: digest.into(),
            content: content.into(),
        }
    }
}

/// Which auto units a merge is responsible for
#[derive(Debug, Clone)]
pub struct Scope {
    /// Encoded key prefix of the units this merge owns
    pub key_prefix: String,
    /// Human line after which new units go when the scope has none yet
    pub anchor: Option<String>,
}

/// A parsed managed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub lines: Vec<Line>,
}

impl Document {
    /// Parse text; malformed tag lines are kept as human lines
    pub fn parse(text: &str) -> Self {
        let raw: Vec<&str> = text.lines().collect();
        let mut lines = Vec::with_capacity(raw.len());
        let mut i = 0;

        while i < raw.len() {
            let line = raw[i];
            let next = raw.get(i + 1).copied();

            if let Some(rest) = line.strip_prefix(AUTO_TAG)
                && let [key, digest] = rest.split_whitespace().collect::<Vec<_>>()[..]
                && let Some(content) = next
            {
                lines.push(Line::Auto {
                    key: key.to_string(),
                    digest: digest.to_string(),
                    content: content.to_string(),
                });
                i += 2;
                continue;
            }

            if let Some(rest) = line.strip_prefix(CONFLICT_TAG)
                && let [kind, key, digest] = rest.split_whitespace().collect::<Vec<_>>()[..]
                && let Some(kind) = ConflictKind::parse(kind)
                && let Some(content) = next.and_then(uncomment)
            {
                lines.push(Line::Conflict {
                    kind,
                    key: key.to_string(),
                    digest: digest.to_string(),
                    content: content.to_string(),
                });
                i += 2;
                continue;
            }

            lines.push(Line::Human(line.to_string()));
            i += 1;
        }

        Self { lines }
    }

    /// Render to text, one physical line per line with a trailing newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Human(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                Line::Auto {
                    key,
                    digest,
                    content,
                } => {
                    out.push_str(&format!("{AUTO_TAG}{key} {digest}\n{content}\n"));
                }
                Line::Conflict {
                    kind,
                    key,
                    digest,
                    content,
                } => {
                    out.push_str(&format!("{CONFLICT_TAG}{kind} {key} {digest}\n"));
                    if content.is_empty() {
                        out.push_str("#\n");
                    } else {
                        out.push_str(&format!("# {content}\n"));
                    }
                }
            }
        }
        out
    }

    /// Number of distinct keys carrying a conflict
    pub fn conflict_count(&self) -> usize {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Conflict { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Merge freshly derived units into this (prior) document
    ///
    /// For auto units inside `scope`:
    /// - same digest: the prior unit is kept as is, including hand edits
    /// - different digest: the prior unit becomes a `changed` conflict,
    ///   followed by the new unit
    /// - missing from `fresh`: the prior unit becomes a `stale` conflict
    ///
    /// Units with new keys are inserted after the last unit of the scope, or
    /// after the anchor line, or at the end. Human lines, conflicts and
    /// units outside the scope are copied through in place.
    pub fn merge(&self, fresh: &[Unit], scope: &Scope) -> Document {
        let by_key: HashMap<&str, &Unit> = fresh.iter().map(|u| (u.key.as_str(), u)).collect();
        let in_scope = |key: &str| key.starts_with(&scope.key_prefix);

        let mut out: Vec<Line> = Vec::with_capacity(self.lines.len() + fresh.len());
        let mut seen: HashSet<&str> = HashSet::new();
        let mut after_last_unit = None;
        let mut after_anchor = None;

        for line in &self.lines {
            match line {
                Line::Auto {
                    key,
                    digest,
                    content,
                } if in_scope(key) => {
                    seen.insert(key.as_str());
                    match by_key.get(key.as_str()) {
                        Some(unit) if unit.digest == *digest => out.push(line.clone()),
                        Some(unit) => {
                            out.push(Line::Conflict {
                                kind: ConflictKind::Changed,
                                key: key.clone(),
                                digest: digest.clone(),
                                content: content.clone(),
                            });
                            out.push(Line::auto(unit));
                        }
                        None => out.push(Line::Conflict {
                            kind: ConflictKind::Stale,
                            key: key.clone(),
                            digest: digest.clone(),
                            content: content.clone(),
                        }),
                    }
                    after_last_unit = Some(out.len());
                }
                Line::Conflict { key, .. } if in_scope(key) => {
                    out.push(line.clone());
                    after_last_unit = Some(out.len());
                }
                Line::Human(text)
                    if after_anchor.is_none()
                        && scope.anchor.as_deref().is_some_and(|a| text.trim() == a) =>
                {
                    out.push(line.clone());
                    after_anchor = Some(out.len());
                }
                other => out.push(other.clone()),
            }
        }

        let new_units: Vec<Line> = fresh
            .iter()
            .filter(|u| !seen.contains(u.key.as_str()))
            .map(Line::auto)
            .collect();

        let at = after_last_unit.or(after_anchor).unwrap_or(out.len());
        out.splice(at..at, new_units);

        Document { lines: out }
    }

    /// Fill a `Field: value` header line
    ///
    /// An auto unit for the field that still holds the content it was
    /// generated with is replaced; an empty human `Field:` line becomes an
    /// auto unit. Anything else counts as a human edit and is left alone.
    /// Returns whether the document changed.
    pub fn fill_header(&mut self, field: &str, value: &str) -> bool {
        let key = encode_key(&format!("header:{field}"));
        let content = format!("{field}: {value}");
        let replacement = Line::auto(&Unit {
            key: key.clone(),
            digest: sha256(content.as_bytes()),
            content: content.clone(),
        });

        for line in self.lines.iter_mut() {
            match line {
                Line::Auto {
                    key: k,
                    digest,
                    content: current,
                } if *k == key => {
                    if sha256(current.as_bytes()) != *digest || *current == content {
                        return false;
                    }
                    *line = replacement;
                    return true;
                }
                Line::Human(text) => {
                    let Some((name, rest)) = text.split_once(':') else {
                        continue;
                    };
                    if !name.trim().eq_ignore_ascii_case(field) {
                        continue;
                    }
                    if !rest.trim().is_empty() {
                        return false;
                    }
                    *line = replacement;
                    return true;
                }
                _ => {}
            }
        }

        false
    }
}

fn uncomment(line: &str) -> Option<&str> {
    if line == "#" {
        Some("")
    } else {
        line.strip_prefix("# ")
    }
}

/// Percent-encode `%` and whitespace so a key is a single token
pub fn encode_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '\t' => out.push_str("%09"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`encode_key`]
pub fn decode_key(key: &str) -> String {
    key.replace("%20", " ")
        .replace("%09", "\t")
        .replace("%0A", "\n")
        .replace("%0D", "\r")
        .replace("%25", "%")
}
