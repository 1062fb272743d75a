// src/filesystem/path.rs

//! Lexical path helpers
//!
//! None of these touch the filesystem: shell history replays directories
//! that may no longer exist, so `cd` targets are resolved purely lexically.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without consulting the filesystem
///
/// `..` at the root stays at the root, as the shell does.
///
/// ```
/// use drydock::filesystem::path::normalize;
/// use std::path::PathBuf;
///
/// assert_eq!(normalize("/p/src/app/../lib/./x"), PathBuf::from("/p/src/lib/x"));
/// assert_eq!(normalize("/.."), PathBuf::from("/"));
/// ```
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Render a relative path with `/` separators, as stored in archives and manifests
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative path that, stored in a symlink at `link`, points at `target`
///
/// Both paths must be relative to the same root (or both absolute).
///
/// ```
/// use drydock::filesystem::path::relative_link_target;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     relative_link_target(Path::new("src/app/lib/a.jar"), Path::new("kit/jars/a.jar")),
///     PathBuf::from("../../../kit/jars/a.jar"),
/// );
/// ```
pub fn relative_link_target(link: &Path, target: &Path) -> PathBuf {
    let link_dir = normalize(link.parent().unwrap_or_else(|| Path::new("")));
    let target = normalize(target);

    let from: Vec<_> = link_dir.components().collect();
    let to: Vec<_> = target.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    out
}

/// True if `path` equals `dir` or lies below it (lexically)
pub fn is_within(path: &Path, dir: &Path) -> bool {
    normalize(path).starts_with(normalize(dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b/../c"), PathBuf::from("/a/c"));
        assert_eq!(normalize("/a/./b/"), PathBuf::from("/a/b"));
        assert_eq!(normalize("/../.."), PathBuf::from("/"));
        assert_eq!(normalize("a/../../b"), PathBuf::from("../b"));
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("kit/m2/x.jar")), "kit/m2/x.jar");
        assert_eq!(to_slash(Path::new("./kit//x")), "kit/x");
    }

    #[test]
    fn test_relative_link_target_same_dir() {
        assert_eq!(
            relative_link_target(Path::new("kit/a.jar"), Path::new("kit/b.jar")),
            PathBuf::from("b.jar")
        );
    }

    #[test]
    fn test_relative_link_target_top_level() {
        assert_eq!(
            relative_link_target(Path::new("x.jar"), Path::new("kit/jars/x.jar")),
            PathBuf::from("kit/jars/x.jar")
        );
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(Path::new("/p/src/app"), Path::new("/p/src/app")));
        assert!(is_within(Path::new("/p/src/app/lib"), Path::new("/p/src/app")));
        assert!(!is_within(Path::new("/p/src/application"), Path::new("/p/src/app")));
        assert!(!is_within(Path::new("/p/src/app/.."), Path::new("/p/src/app")));
    }
}
