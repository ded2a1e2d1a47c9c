//! The two `pyproject.toml` sources: flit's legacy
//! `[tool.flit.metadata.requires-extra]` table and the standards-track
//! `[project.optional-dependencies]` table.
//!
//! Unlike the other readers these re-serialize each entry to canonical form
//! before handing it over, so `pytest >=2.7.3` comes back as `pytest>=2.7.3`.
//! Manifest entries are structured data, and an entry that does not even
//! parse is best reported against the manifest it came from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fs_err as fs;
use serde::Deserialize;
use tracing::debug;

use pyextras_pep508::Requirement;

use crate::{Context, Options, SourceError};

#[derive(Debug, Deserialize)]
struct PyProjectToml {
    project: Option<Project>,
    tool: Option<Tool>,
}

#[derive(Debug, Deserialize)]
struct Project {
    name: Option<String>,
    #[serde(rename = "optional-dependencies")]
    optional_dependencies: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Deserialize)]
struct Tool {
    flit: Option<Flit>,
}

#[derive(Debug, Deserialize)]
struct Flit {
    metadata: Option<FlitMetadata>,
}

#[derive(Debug, Deserialize)]
struct FlitMetadata {
    #[serde(rename = "requires-extra")]
    requires_extra: Option<BTreeMap<String, Vec<String>>>,
}

fn read_pyproject(context: &Context) -> Result<(PathBuf, PyProjectToml), SourceError> {
    let path = context.repo_root().join("pyproject.toml");
    if !path.is_file() {
        return Err(SourceError::NotFound {
            name: "pyproject.toml".to_string(),
            dir: context.repo_root().to_path_buf(),
        });
    }
    let contents = fs::read_to_string(&path)?;
    let pyproject = toml::from_str(&contents).map_err(|err| SourceError::TomlSyntax {
        path: path.clone(),
        source: Box::new(err),
    })?;
    Ok((path, pyproject))
}

/// Re-serializes every entry of the extra to its canonical form.
fn canonicalize(requirements: &[String], path: &Path) -> Result<Vec<String>, SourceError> {
    requirements
        .iter()
        .map(|raw| {
            Requirement::from_str(raw)
                .map(|requirement| requirement.to_string())
                .map_err(|source| SourceError::InvalidRequirement {
                    requirement: raw.clone(),
                    path: path.to_path_buf(),
                    source,
                })
        })
        .collect()
}

pub(crate) fn requirements_from_flit(
    _package_root: &Path,
    _options: &Options,
    context: &Context,
    extra: &str,
) -> Result<Vec<String>, SourceError> {
    let (path, pyproject) = read_pyproject(context)?;
    let Some(extras) = pyproject
        .tool
        .and_then(|tool| tool.flit)
        .and_then(|flit| flit.metadata)
        .and_then(|metadata| metadata.requires_extra)
    else {
        return Err(SourceError::SectionMissing {
            section: "tool.flit.metadata.requires-extra",
            file: "pyproject.toml",
        });
    };
    let Some(requirements) = extras.get(extra) else {
        return Err(SourceError::KeyMissing {
            extra: extra.to_string(),
            table: "[tool.flit.metadata.requires-extra]",
        });
    };
    canonicalize(requirements, &path)
}

pub(crate) fn requirements_from_pyproject(
    _package_root: &Path,
    _options: &Options,
    context: &Context,
    extra: &str,
) -> Result<Vec<String>, SourceError> {
    let (path, pyproject) = read_pyproject(context)?;
    let Some(extras) = pyproject
        .project
        .and_then(|project| project.optional_dependencies)
    else {
        return Err(SourceError::SectionMissing {
            section: "project.optional-dependencies",
            file: "pyproject.toml",
        });
    };
    let Some(requirements) = extras.get(extra) else {
        return Err(SourceError::KeyMissing {
            extra: extra.to_string(),
            table: "[project.optional-dependencies]",
        });
    };
    canonicalize(requirements, &path)
}

/// The `[project] name` declared in the repository's `pyproject.toml`, used
/// as the fallback display name for the install command.
pub fn project_name(context: &Context) -> Option<String> {
    let path = context.repo_root().join("pyproject.toml");
    let contents = fs::read_to_string(&path).ok()?;
    let pyproject: PyProjectToml = match toml::from_str(&contents) {
        Ok(pyproject) => pyproject,
        Err(err) => {
            debug!("Not reading the project name from {}: {err}", path.display());
            return None;
        }
    };
    pyproject.project.and_then(|project| project.name)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indoc::indoc;
    use tempfile::TempDir;

    use crate::{Context, Options, SourceError};

    use super::{project_name, requirements_from_flit, requirements_from_pyproject};

    fn write_pyproject(contents: &str) -> (TempDir, Context) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("pyproject.toml"), contents).unwrap();
        let context = Context::new(tmp.path().join("docs"));
        (tmp, context)
    }

    const FLIT_MANIFEST: &str = indoc! {r#"
        [tool.flit.metadata]
        author = "Joe Bloggs"
        module = "FooBar"

        [tool.flit.metadata.requires-extra]
        extra_c = [
            "faker",
            "pytest",
            'tox; python_version <= "3.6"',
        ]
        test = [
            "pytest >=2.7.3",
            "pytest-cov",
        ]
        doc = ["sphinx"]
    "#};

    const PROJECT_MANIFEST: &str = indoc! {r#"
        [project]
        name = "FooBar"

        [project.optional-dependencies]
        extra_c = [
            "faker",
            "pytest",
            'tox; python_version <= "3.6"',
        ]
        test = [
            "pytest >=2.7.3",
            "pytest-cov",
        ]
        doc = ["sphinx"]
    "#};

    #[test]
    fn flit_reads_and_canonicalizes() {
        let (tmp, context) = write_pyproject(FLIT_MANIFEST);
        let requirements =
            requirements_from_flit(tmp.path(), &Options::new(), &context, "extra_c").unwrap();
        assert_eq!(
            requirements,
            ["faker", "pytest", "tox; python_version <= \"3.6\""]
        );
        let requirements =
            requirements_from_flit(tmp.path(), &Options::new(), &context, "test").unwrap();
        assert_eq!(requirements, ["pytest>=2.7.3", "pytest-cov"]);
    }

    #[test]
    fn flit_missing_extra() {
        let (tmp, context) = write_pyproject(FLIT_MANIFEST);
        let err = requirements_from_flit(tmp.path(), &Options::new(), &context, "testing")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "'testing' not found in '[tool.flit.metadata.requires-extra]'"
        );
    }

    #[test]
    fn flit_missing_table() {
        let (tmp, context) = write_pyproject("[tool.poetry]\nname = \"x\"\n");
        let err =
            requirements_from_flit(tmp.path(), &Options::new(), &context, "docs").unwrap_err();
        assert!(matches!(err, SourceError::SectionMissing { .. }));
    }

    #[test]
    fn pyproject_reads_and_canonicalizes() {
        let (tmp, context) = write_pyproject(PROJECT_MANIFEST);
        let requirements =
            requirements_from_pyproject(tmp.path(), &Options::new(), &context, "test").unwrap();
        assert_eq!(requirements, ["pytest>=2.7.3", "pytest-cov"]);
    }

    #[test]
    fn pyproject_missing_extra() {
        let (tmp, context) = write_pyproject(PROJECT_MANIFEST);
        let err = requirements_from_pyproject(tmp.path(), &Options::new(), &context, "docs")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "'docs' not found in '[project.optional-dependencies]'"
        );
    }

    #[test]
    fn missing_manifest() {
        let tmp = TempDir::new().unwrap();
        let context = Context::new(tmp.path().join("docs"));
        let err = requirements_from_pyproject(tmp.path(), &Options::new(), &context, "docs")
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
        assert!(err.to_string().starts_with("Cannot find pyproject.toml in"));
    }

    #[test]
    fn invalid_manifest_entry() {
        let (tmp, context) = write_pyproject(indoc! {r#"
            [project.optional-dependencies]
            broken = ["foo!"]
        "#});
        let err = requirements_from_pyproject(tmp.path(), &Options::new(), &context, "broken")
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidRequirement { .. }));
    }

    #[test]
    fn invalid_toml() {
        let (tmp, context) = write_pyproject("project = [unclosed\n");
        let err = requirements_from_pyproject(tmp.path(), &Options::new(), &context, "docs")
            .unwrap_err();
        assert!(matches!(err, SourceError::TomlSyntax { .. }));
    }

    #[test]
    fn project_name_fallback() {
        let (_tmp, context) = write_pyproject(PROJECT_MANIFEST);
        assert_eq!(project_name(&context).as_deref(), Some("FooBar"));

        let tmp = TempDir::new().unwrap();
        let context = Context::new(tmp.path().join("docs"));
        assert_eq!(project_name(&context), None);
    }
}
