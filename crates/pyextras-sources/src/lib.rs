//! The supported sources for extras requirements, and the policy that picks
//! exactly one of them.
//!
//! Every source reads one declarative metadata format and extracts the
//! requirement list of a named extra:
//!
//! * a requirements file named by the `file` option,
//! * an `extras_require` mapping in `__pkginfo__.py`,
//! * the `[options.extras_require]` section of `setup.cfg`,
//! * the `[tool.flit.metadata.requires-extra]` table of `pyproject.toml`,
//! * the `[project.optional-dependencies]` table of `pyproject.toml`.
//!
//! Inline content supplied with the directive body counts as a source of its
//! own. [`resolve`] enforces that exactly one source is selected and
//! dispatches to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use pyextras_pep508::SpecifierError;

pub use crate::pyproject::project_name;

mod file;
mod pkginfo;
mod pyproject;
mod setup_cfg;

/// The raw option map of one directive invocation, option name to value.
/// Flag-style options are present with an empty value.
pub type Options = BTreeMap<String, String>;

/// Everything that can go wrong while selecting a source or reading from it.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No source option was given and the directive body was empty.
    #[error("Please specify a source for the extra requirements")]
    NoSourceSpecified,
    /// More than one source was selected at once.
    #[error("Please specify only one source for the extra requirements")]
    AmbiguousSource,
    /// The `package_root` configuration value is required before any reader
    /// touches the filesystem.
    #[error("The 'package_root' configuration value is not set")]
    MissingConfiguration,
    /// A flag-style option was given an argument.
    #[error("No argument is allowed; '{value}' supplied to the '{option}' option")]
    UnexpectedOptionValue {
        /// The option name.
        option: &'static str,
        /// The value that should not be there.
        value: String,
    },
    /// An option that needs an argument was given none.
    #[error("The '{option}' option requires an argument")]
    MissingOptionValue {
        /// The option name.
        option: &'static str,
    },
    /// A metadata file is absent.
    #[error("Cannot find {name} in {}", dir.display())]
    NotFound {
        /// Description of the missing file.
        name: String,
        /// The directory that was searched.
        dir: PathBuf,
    },
    /// A requirements file exists but does not look like text.
    #[error("'{}' is not a text file.", path.display())]
    NotText {
        /// The offending file.
        path: PathBuf,
    },
    /// A config file exists but lacks the section the reader needs.
    #[error("'{section}' section not found in '{file}'")]
    SectionMissing {
        /// The section that was looked for.
        section: &'static str,
        /// The file that was searched.
        file: &'static str,
    },
    /// The section or mapping exists but has no entry for the extra.
    #[error("'{extra}' not found in '{table}'")]
    KeyMissing {
        /// The requested extra.
        extra: String,
        /// The table or mapping that was searched.
        table: &'static str,
    },
    /// `__pkginfo__.py` exists but its `extras_require` could not be read.
    #[error("Could not import __pkginfo__.py: {reason}")]
    ImportFailure {
        /// Why loading failed.
        reason: String,
    },
    /// `pyproject.toml` is not valid TOML.
    #[error("Failed to parse {}", path.display())]
    TomlSyntax {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// A manifest entry is not a valid dependency specifier.
    #[error("Invalid requirement '{requirement}' in {}", path.display())]
    InvalidRequirement {
        /// The entry, as written in the manifest.
        requirement: String,
        /// The manifest it came from.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: SpecifierError,
    },
    /// An I/O failure outside the "file is absent" case.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where one resolution happens: the documentation source directory. The
/// repository root is taken to be its parent, which is where `setup.cfg`,
/// `__pkginfo__.py` and `pyproject.toml` live.
#[derive(Debug, Clone)]
pub struct Context {
    source_dir: PathBuf,
}

impl Context {
    /// A context for a documentation source directory.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    /// The documentation source directory.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// The repository root, i.e. the parent of the documentation source
    /// directory.
    pub fn repo_root(&self) -> &Path {
        self.source_dir.parent().unwrap_or(&self.source_dir)
    }
}

/// How a source's option value is checked before dispatch.
#[derive(Debug, Clone, Copy)]
pub enum OptionValidator {
    /// The option is a bare flag; any value is an error.
    Flag,
    /// The option carries a mandatory argument.
    Argument,
}

impl OptionValidator {
    fn check(self, option: &'static str, value: &str) -> Result<(), SourceError> {
        match self {
            Self::Flag if !value.trim().is_empty() => Err(SourceError::UnexpectedOptionValue {
                option,
                value: value.to_string(),
            }),
            Self::Argument if value.trim().is_empty() => {
                Err(SourceError::MissingOptionValue { option })
            }
            _ => Ok(()),
        }
    }
}

/// A reader: package root, options, context and extra name in, raw
/// requirement strings out.
pub type Getter = fn(&Path, &Options, &Context, &str) -> Result<Vec<String>, SourceError>;

/// One registered source.
#[derive(Debug, Clone, Copy)]
pub struct SourceDescriptor {
    /// The directive option that selects this source.
    pub option: &'static str,
    /// The reader to dispatch to.
    pub getter: Getter,
    /// How the option value is checked.
    pub validator: OptionValidator,
}

/// The source registry. Built once, immutable, and consulted by presence of
/// the option, never by position.
pub const SOURCES: &[SourceDescriptor] = &[
    SourceDescriptor {
        option: "__pkginfo__",
        getter: pkginfo::requirements_from_pkginfo,
        validator: OptionValidator::Flag,
    },
    SourceDescriptor {
        option: "file",
        getter: file::requirements_from_file,
        validator: OptionValidator::Argument,
    },
    SourceDescriptor {
        option: "setup.cfg",
        getter: setup_cfg::requirements_from_setup_cfg,
        validator: OptionValidator::Flag,
    },
    SourceDescriptor {
        option: "flit",
        getter: pyproject::requirements_from_flit,
        validator: OptionValidator::Flag,
    },
    SourceDescriptor {
        option: "pyproject",
        getter: pyproject::requirements_from_pyproject,
        validator: OptionValidator::Flag,
    },
];

/// Selects the single active source and returns its raw requirement list.
///
/// Active sources are the registered options present in `options` plus the
/// inline `content` if it is non-empty. Zero active sources is
/// [`SourceError::NoSourceSpecified`], more than one is
/// [`SourceError::AmbiguousSource`]. Dispatching to a reader additionally
/// requires the shared `package_root` setting; inline content is returned
/// verbatim and needs no configuration.
pub fn resolve(
    extra: &str,
    options: &Options,
    content: &[String],
    package_root: Option<&Path>,
    context: &Context,
) -> Result<Vec<String>, SourceError> {
    let mut active = Vec::new();
    for descriptor in SOURCES {
        if let Some(value) = options.get(descriptor.option) {
            descriptor.validator.check(descriptor.option, value)?;
            active.push(descriptor);
        }
    }
    match active.len() + usize::from(!content.is_empty()) {
        0 => Err(SourceError::NoSourceSpecified),
        1 => {
            if let Some(descriptor) = active.first() {
                let Some(package_root) = package_root else {
                    return Err(SourceError::MissingConfiguration);
                };
                let package_root = context.repo_root().join(package_root);
                debug!(
                    "Reading requirements for extra '{extra}' from the '{}' source",
                    descriptor.option
                );
                (descriptor.getter)(&package_root, options, context, extra)
            } else {
                debug!("Using the directive body as the requirement list for extra '{extra}'");
                Ok(content.to_vec())
            }
        }
        _ => Err(SourceError::AmbiguousSource),
    }
}
