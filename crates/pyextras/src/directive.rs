//! The `extras-require` directive surface: one invocation in, one rendered
//! notice (or nothing) out.

use thiserror::Error;
use tracing::warn;

use pyextras_pep508::{validate_requirements, ValidationError};
use pyextras_sources::{project_name, resolve, Context, Options, SourceError};

use crate::config::Config;
use crate::render::make_node_content;

/// One directive invocation.
#[derive(Debug)]
pub struct ExtraRequest<'a> {
    /// The name of the extra being documented.
    pub extra: &'a str,
    /// What "has" the requirements; defaults to `"module"`.
    pub scope: Option<&'a str>,
    /// The raw option map.
    pub options: &'a Options,
    /// The directive body, used verbatim as the requirement list when no
    /// other source is selected.
    pub content: &'a [String],
}

/// Why a directive invocation failed.
#[derive(Debug, Error)]
pub enum DirectiveError {
    /// Source selection or the selected reader failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The requirement list did not validate.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No display name was configured and `pyproject.toml` declares none.
    #[error("No package name is configured and pyproject.toml does not declare one")]
    MissingProjectName,
}

/// Resolves, validates and renders one directive invocation.
///
/// Returns `Ok(None)` when the selected source yields no entries at all; the
/// build degrades to rendering nothing rather than failing. An empty list
/// after blank-line filtering is still a validation error, as is anything
/// else in [`DirectiveError`].
pub fn render(
    request: &ExtraRequest<'_>,
    config: &Config,
    context: &Context,
) -> Result<Option<String>, DirectiveError> {
    let raw = resolve(
        request.extra,
        request.options,
        request.content,
        config.package_root.as_deref(),
        context,
    )?;
    if raw.is_empty() {
        warn!("No requirements specified! No notice will be shown in the documentation.");
        return Ok(None);
    }
    let requirements = validate_requirements(&raw)?;
    let project = match &config.project {
        Some(name) => name.clone(),
        None => project_name(context).ok_or(DirectiveError::MissingProjectName)?,
    };
    let scope = request.scope.unwrap_or("module");
    Ok(Some(make_node_content(
        &requirements,
        &project,
        request.extra,
        scope,
    )))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use indoc::indoc;
    use tempfile::TempDir;

    use pyextras_sources::{Context, Options, SourceError};

    use crate::config::Config;

    use super::{render, DirectiveError, ExtraRequest};

    /// A repository with a docs dir, a requirements file and a pyproject.toml
    /// declaring the project name.
    fn repository() -> (TempDir, Context) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("docs")).unwrap();
        fs::write(
            tmp.path().join("pyproject.toml"),
            indoc! {r#"
                [project]
                name = "my_package"
            "#},
        )
        .unwrap();
        fs::write(
            tmp.path().join("requirements-extra.txt"),
            "numpy>=1.18.4\nscipy==1.4.1\n# comment\npandas>=0.25.0, !=1.0.0\n",
        )
        .unwrap();
        let context = Context::new(tmp.path().join("docs"));
        (tmp, context)
    }

    fn config() -> Config {
        Config {
            package_root: Some(PathBuf::from(".")),
            project: None,
        }
    }

    #[test]
    fn renders_a_notice_from_a_requirements_file() {
        let (_tmp, context) = repository();
        let options = Options::from([("file".to_string(), "requirements-extra.txt".to_string())]);
        let request = ExtraRequest {
            extra: "extra_a",
            scope: None,
            options: &options,
            content: &[],
        };
        let notice = render(&request, &config(), &context).unwrap().unwrap();
        // Canonical, deduplicated, sorted; comments dropped.
        assert!(notice.contains("        numpy>=1.18.4\n        pandas!=1.0.0,>=0.25.0\n        scipy==1.4.1\n"));
        assert!(notice.contains("These can be installed as follows:"));
        assert!(notice.contains("$ python -m pip install my_package[extra_a]"));
    }

    #[test]
    fn scope_and_configured_name_override_the_defaults() {
        let (_tmp, context) = repository();
        let options = Options::new();
        let content = vec!["sphinx".to_string()];
        let request = ExtraRequest {
            extra: "docs",
            scope: Some("class"),
            options: &options,
            content: &content,
        };
        let config = Config {
            package_root: None,
            project: Some("renamed".to_string()),
        };
        let notice = render(&request, &config, &context).unwrap().unwrap();
        assert!(notice.starts_with("This class has the following additional requirement:"));
        assert!(notice.contains("$ python -m pip install renamed[docs]"));
    }

    #[test]
    fn an_empty_source_renders_nothing() {
        let (tmp, context) = repository();
        fs::write(tmp.path().join("requirements-extra.txt"), "# only a comment\n").unwrap();
        let options = Options::from([("file".to_string(), "requirements-extra.txt".to_string())]);
        let request = ExtraRequest {
            extra: "extra_a",
            scope: None,
            options: &options,
            content: &[],
        };
        assert!(render(&request, &config(), &context).unwrap().is_none());
    }

    #[test]
    fn blank_inline_content_is_a_validation_error() {
        let (_tmp, context) = repository();
        let options = Options::new();
        let content = vec!["   ".to_string()];
        let request = ExtraRequest {
            extra: "docs",
            scope: None,
            options: &options,
            content: &content,
        };
        let err = render(&request, &config(), &context).unwrap_err();
        assert!(matches!(err, DirectiveError::Validation(_)));
    }

    #[test]
    fn source_errors_pass_through() {
        let (_tmp, context) = repository();
        let options = Options::from([
            ("setup.cfg".to_string(), String::new()),
            ("flit".to_string(), String::new()),
        ]);
        let request = ExtraRequest {
            extra: "docs",
            scope: None,
            options: &options,
            content: &[],
        };
        let err = render(&request, &config(), &context).unwrap_err();
        assert!(matches!(
            err,
            DirectiveError::Source(SourceError::AmbiguousSource)
        ));
    }

    #[test]
    fn missing_project_name() {
        let (tmp, context) = repository();
        fs::remove_file(tmp.path().join("pyproject.toml")).unwrap();
        let options = Options::new();
        let content = vec!["sphinx".to_string()];
        let request = ExtraRequest {
            extra: "docs",
            scope: None,
            options: &options,
            content: &content,
        };
        let err = render(&request, &config(), &context).unwrap_err();
        assert!(matches!(err, DirectiveError::MissingProjectName));
    }
}
