// src/pom.rs

//! Maven POM metadata used to seed spec headers

use crate::error::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// Fields of a POM relevant to packaging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    /// First `licenses/license/name`
    pub license: Option<String>,
}

impl Pom {
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Parse POM text
    ///
    /// Only top-level elements are read; `groupId` and `version` fall back to
    /// the `parent` element's values.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut pom = Pom::default();
        let mut parent_group_id = None;
        let mut parent_version = None;
        let mut stack: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(t) => {
                    let text = t.unescape()?.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    let path: Vec<&str> = stack.iter().map(String::as_str).collect();
                    let slot = match path.as_slice() {
                        ["project", "groupId"] => &mut pom.group_id,
                        ["project", "artifactId"] => &mut pom.artifact_id,
                        ["project", "version"] => &mut pom.version,
                        ["project", "name"] => &mut pom.name,
                        ["project", "description"] => &mut pom.description,
                        ["project", "url"] => &mut pom.url,
                        ["project", "licenses", "license", "name"] => &mut pom.license,
                        ["project", "parent", "groupId"] => &mut parent_group_id,
                        ["project", "parent", "version"] => &mut parent_version,
                        _ => continue,
                    };
                    if slot.is_none() {
                        *slot = Some(text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        pom.group_id = pom.group_id.or(parent_group_id);
        pom.version = pom.version.or(parent_version);
        Ok(pom)
    }

    /// One-line summary: the project name, else the first line of the description
    pub fn summary(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            self.description
                .as_deref()
                .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()))
                .map(str::to_string)
        })
    }
}
