//! The shared configuration values the host build provides.

use std::path::PathBuf;

/// Build-wide settings, the equivalent of the host's configuration file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Location of the package root, relative to the directory containing
    /// the documentation source directory. Required before any metadata
    /// reader runs.
    pub package_root: Option<PathBuf>,
    /// Display name for the package in the install command. When unset, the
    /// name declared in the repository's `pyproject.toml` is used.
    pub project: Option<String>,
}
