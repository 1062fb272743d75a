// src/generate/spec.rs

//! RPM spec generation for the kit and for source packages

use super::{load_or_template, path_digest, write_document, GenerationResult};
use crate::diff::{Category, ChangeKind, ChangeSet};
use crate::error::Result;
use crate::generate::managed::{Scope, Unit};
use crate::pom::Pom;
use crate::project::{Project, KIT_DIR, SRC_DIR};
use glob::Pattern;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Line after which `%files` entries are inserted
pub const FILES_ANCHOR: &str = "%files";

fn files_scope() -> Scope {
    Scope {
        key_prefix: "file:".to_string(),
        anchor: Some(FILES_ANCHOR.to_string()),
    }
}

/// Quote a `%files` path when RPM would otherwise split it
fn files_entry(path: String) -> String {
    if path.contains(char::is_whitespace) {
        format!("\"{path}\"")
    } else {
        path
    }
}

fn kit_template(project: &str) -> String {
    format!(
        "\
Name:           {project}-kit
Version:        1
Release:        1
Summary:        Build dependencies of {project}
License:        Various
BuildArch:      noarch

Source0:        kit.tar.gz

%description
Binary dependencies needed to build the packages of {project}.

%prep
%setup -q -c

%build

%install
mkdir -p %{{buildroot}}%{{_datadir}}/%{{name}}
cp -a {KIT_DIR}/. %{{buildroot}}%{{_datadir}}/%{{name}}/

%files

%changelog
"
    )
}

fn package_template(project: &str, package: &str, filter: &str) -> String {
    format!(
        "\
Name:
Version:
Release:        1
Summary:
License:
URL:
BuildArch:      noarch

Source0:        {package}.tar.gz
Source1:        build.sh

BuildRequires:  {project}-kit

%description
%{{summary}}.

%prep
%setup -q -n {package}

%build
PROJECT_PREFIX=$(readlink -e ..) sh %{{SOURCE1}}

%install
mkdir -p %{{buildroot}}%{{_javadir}}
find . -type f -name '{filter}' -exec cp {{}} %{{buildroot}}%{{_javadir}}/ \\;

%files

%changelog
"
    )
}

/// Generate `output/kit/<project>-kit.spec`
///
/// `%files` lists every file currently under `kit/`.
pub fn generate_kit_spec(project: &Project, changes: &ChangeSet) -> Result<GenerationResult> {
    let name = project.name();
    let target = project.output_dir().join(KIT_DIR).join(format!("{name}-kit.spec"));

    let mut fresh = Vec::new();
    for path in changes.current_paths_under(KIT_DIR) {
        let below = &path[KIT_DIR.len() + 1..];
        fresh.push(Unit::new(
            &format!("file:{below}"),
            path_digest(&project.root().join(&path))?,
            files_entry(format!("%{{_datadir}}/%{{name}}/{below}")),
        ));
    }
    debug!("Kit spec lists {} files", fresh.len());

    let prior = load_or_template(&target, &kit_template(&name))?;
    let merged = prior.merge(&fresh, &files_scope());
    write_document(&target, &merged, 0o644)
}

/// Generate `output/<package>/<package>.spec`
///
/// Header fields are seeded from `pom` (default `src/<package>/pom.xml`);
/// `%files` lists the source and build-output files of the package that the
/// dry run added or changed and whose basename matches `filter` (default
/// from the project configuration). Files present before the dry run, such
/// as bundled third-party jars, are not listed.
pub fn generate_package_spec(
    project: &Project,
    changes: &ChangeSet,
    package: &str,
    pom: Option<&Path>,
    filter: Option<&str>,
) -> Result<GenerationResult> {
    let package_dir = project.package_dir(package)?;
    let filter = filter.unwrap_or(&project.config().spec.default_filter);
    let pattern = Pattern::new(filter)?;
    let target = project
        .package_output_dir(package)
        .join(format!("{package}.spec"));

    let prefix = format!("{SRC_DIR}/{package}");
    let mut fresh = Vec::new();
    let mut installed: HashMap<String, &str> = HashMap::new();
    for entry in changes.under(&prefix) {
        if entry.kind == ChangeKind::Removed
            || !matches!(entry.category, Category::Source | Category::Generated)
        {
            continue;
        }
        let rel = Path::new(&entry.path);
        let Some(basename) = rel.file_name().map(|n| n.to_string_lossy()) else {
            continue;
        };
        if !pattern.matches(&basename) {
            continue;
        }
        // %install flattens into %{_javadir}
        if let Some(first) = installed.get(basename.as_ref()) {
            warn!(
                "{} and {} both install as %{{_javadir}}/{}, listing only the first",
                first, entry.path, basename
            );
            continue;
        }
        installed.insert(basename.to_string(), &entry.path);

        let below = &entry.path[prefix.len() + 1..];
        fresh.push(Unit::new(
            &format!("file:{below}"),
            path_digest(&project.root().join(&entry.path))?,
            files_entry(format!("%{{_javadir}}/{basename}")),
        ));
    }
    debug!("Package spec for {} lists {} files", package, fresh.len());

    let prior = load_or_template(&target, &package_template(&project.name(), package, filter))?;
    let mut merged = prior.merge(&fresh, &files_scope());

    let pom_path = pom
        .map(PathBuf::from)
        .unwrap_or_else(|| package_dir.join("pom.xml"));
    let pom = load_pom(&pom_path);

    let name = pom
        .as_ref()
        .and_then(|p| p.artifact_id.clone())
        .unwrap_or_else(|| package.to_string());
    merged.fill_header("Name", &name);
    if let Some(pom) = pom {
        let fields = [
            ("Version", pom.version.clone()),
            ("Summary", pom.summary()),
            ("License", pom.license.clone()),
            ("URL", pom.url.clone()),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                merged.fill_header(field, &value);
            }
        }
    }

    write_document(&target, &merged, 0o644)
}

fn load_pom(path: &Path) -> Option<Pom> {
    if !path.exists() {
        warn!("No POM at {}, spec header left as is", path.display());
        return None;
    }
    match Pom::from_file(path) {
        Ok(pom) => Some(pom),
        Err(e) => {
            warn!("Cannot read POM {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::managed::{ConflictKind, Document, Line};
    use crate::transaction::{DryRunController, DryRunSession};
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn start(project: &Project) -> DryRunSession {
        let controller = DryRunController::new(project);
        controller.begin(project.root()).unwrap();
        controller.require_session().unwrap()
    }

    #[test]
    fn test_kit_spec_lists_kit_files() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        let session = start(&project);

        write(temp.path(), "kit/m2/com/x/1.0/x-1.0.jar", "jar");
        let changes = ChangeSet::compute(&project, &session).unwrap();
        let result = generate_kit_spec(&project, &changes).unwrap();

        assert_eq!(result.conflicts, 0);
        assert_eq!(
            result.path,
            project
                .output_dir()
                .join(format!("kit/{}-kit.spec", project.name()))
        );
        let text = fs::read_to_string(&result.path).unwrap();
        assert!(text.contains("%files\n#@ auto file:m2/com/x/1.0/x-1.0.jar "));
        assert!(text.contains("\n%{_datadir}/%{name}/m2/com/x/1.0/x-1.0.jar\n"));

        // Regenerating is stable
        let again = generate_kit_spec(&project, &changes).unwrap();
        assert_eq!(again.conflicts, 0);
        assert_eq!(fs::read_to_string(&again.path).unwrap(), text);
    }

    #[test]
    fn test_kit_spec_removed_file_is_stale() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        write(temp.path(), "kit/m2/com/x/1.0/x-1.0.jar", "jar");
        write(temp.path(), "kit/m2/com/y/1.0/y-1.0.jar", "jar");

        let session = start(&project);
        let changes = ChangeSet::compute(&project, &session).unwrap();
        generate_kit_spec(&project, &changes).unwrap();

        fs::remove_file(temp.path().join("kit/m2/com/x/1.0/x-1.0.jar")).unwrap();
        let changes = ChangeSet::compute(&project, &session).unwrap();
        let result = generate_kit_spec(&project, &changes).unwrap();
        assert_eq!(result.conflicts, 1);

        let doc = Document::parse(&fs::read_to_string(&result.path).unwrap());
        assert!(doc.lines.iter().any(|l| matches!(
            l,
            Line::Conflict { kind: ConflictKind::Stale, key, .. } if key == "file:m2/com/x/1.0/x-1.0.jar"
        )));
    }

    #[test]
    fn test_package_spec_from_pom() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        write(
            temp.path(),
            "src/app/pom.xml",
            "<project><artifactId>app</artifactId><version>1.2</version>\
             <name>The App</name><url>https://example.org</url>\
             <licenses><license><name>MIT</name></license></licenses></project>",
        );
        let session = start(&project);

        write(temp.path(), "src/app/target/app-1.2.jar", "built");
        write(temp.path(), "src/app/target/classes/Main.class", "class");
        let changes = ChangeSet::compute(&project, &session).unwrap();
        let result = generate_package_spec(&project, &changes, "app", None, None).unwrap();

        assert_eq!(result.conflicts, 0);
        assert_eq!(result.path, project.root().join("output/app/app.spec"));
        let text = fs::read_to_string(&result.path).unwrap();
        assert!(text.contains("\nName: app\n"));
        assert!(text.contains("\nVersion: 1.2\n"));
        assert!(text.contains("\nSummary: The App\n"));
        assert!(text.contains("\nLicense: MIT\n"));
        assert!(text.contains("\nURL: https://example.org\n"));
        assert!(text.contains("#@ auto file:target/app-1.2.jar "));
        assert!(text.contains("\n%{_javadir}/app-1.2.jar\n"));
        assert!(!text.contains("Main.class"));
    }

    #[test]
    fn test_package_spec_filter_and_missing_pom() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        write(temp.path(), "src/lib/build.xml", "<project/>");
        let session = start(&project);

        write(temp.path(), "src/lib/dist/lib.war", "war");
        write(temp.path(), "src/lib/dist/lib.jar", "jar");
        let changes = ChangeSet::compute(&project, &session).unwrap();
        let result =
            generate_package_spec(&project, &changes, "lib", None, Some("*.war")).unwrap();

        let text = fs::read_to_string(&result.path).unwrap();
        assert!(text.contains("\nName: lib\n"));
        assert!(text.contains("\nVersion:\n"));
        assert!(text.contains("%{_javadir}/lib.war"));
        assert!(!text.contains("%{_javadir}/lib.jar"));
    }

    #[test]
    fn test_package_spec_keeps_human_header() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        write(
            temp.path(),
            "src/app/pom.xml",
            "<project><artifactId>app</artifactId><version>1.0</version></project>",
        );
        let session = start(&project);
        let changes = ChangeSet::compute(&project, &session).unwrap();
        let result = generate_package_spec(&project, &changes, "app", None, None).unwrap();

        let text = fs::read_to_string(&result.path).unwrap();
        fs::write(
            &result.path,
            text.replace("\nVersion: 1.0\n", "\nVersion: 1.0.custom\n"),
        )
        .unwrap();

        write(
            temp.path(),
            "src/app/pom.xml",
            "<project><artifactId>app</artifactId><version>2.0</version></project>",
        );
        let changes = ChangeSet::compute(&project, &session).unwrap();
        generate_package_spec(&project, &changes, "app", None, None).unwrap();

        let text = fs::read_to_string(&result.path).unwrap();
        assert!(text.contains("\nVersion: 1.0.custom\n"));
        assert!(!text.contains("Version: 2.0"));
    }

    #[test]
    fn test_package_spec_lists_shared_basename_once() {
        let temp = TempDir::new().unwrap();
        let project = Project::init(temp.path()).unwrap();
        write(temp.path(), "src/app/pom.xml", "<project/>");
        let session = start(&project);

        write(temp.path(), "src/app/module/target/app.jar", "module build");
        write(temp.path(), "src/app/target/app.jar", "main build");
        write(temp.path(), "src/app/lib/dep.jar", "vendored during build");
        let changes = ChangeSet::compute(&project, &session).unwrap();
        let result = generate_package_spec(&project, &changes, "app", None, None).unwrap();

        let text = fs::read_to_string(&result.path).unwrap();
        assert_eq!(text.matches("\n%{_javadir}/app.jar\n").count(), 1);
        assert!(text.contains("#@ auto file:module/target/app.jar "));
        assert!(!text.contains("file:target/app.jar"));
        assert!(text.contains("\n%{_javadir}/dep.jar\n"));
    }

    #[test]
    fn test_files_entry_quotes_whitespace() {
        assert_eq!(files_entry("/a b.jar".to_string()), "\"/a b.jar\"");
        assert_eq!(files_entry("/ab.jar".to_string()), "/ab.jar");
    }
}
