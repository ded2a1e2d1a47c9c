//! The `setup.cfg` source: the `[options.extras_require]` section of the
//! setuptools config file at the repository root.
//!
//! setup.cfg is INI-shaped: `[section]` headers, `key = value` entries, and
//! values that may continue over indented follow-up lines. The section scan
//! here covers exactly that subset; a full INI parser buys nothing for one
//! section of one well-known file.

use std::collections::BTreeMap;
use std::path::Path;

use fs_err as fs;

use crate::{Context, Options, SourceError};

const SECTION: &str = "options.extras_require";

pub(crate) fn requirements_from_setup_cfg(
    _package_root: &Path,
    _options: &Options,
    context: &Context,
    extra: &str,
) -> Result<Vec<String>, SourceError> {
    let path = context.repo_root().join("setup.cfg");
    if !path.is_file() {
        return Err(SourceError::NotFound {
            name: "setup.cfg".to_string(),
            dir: context.repo_root().to_path_buf(),
        });
    }
    let contents = fs::read_to_string(&path)?;
    let Some(entries) = extras_require_section(&contents) else {
        return Err(SourceError::SectionMissing {
            section: SECTION,
            file: "setup.cfg",
        });
    };
    let Some(value) = entries.get(extra) else {
        return Err(SourceError::KeyMissing {
            extra: extra.to_string(),
            table: "[options.extras_require]",
        });
    };
    Ok(split_value(value))
}

/// The key/value entries of `[options.extras_require]`, or `None` if the
/// section is absent. Values keep continuation lines joined with `\n`.
fn extras_require_section(contents: &str) -> Option<BTreeMap<String, String>> {
    let mut entries: BTreeMap<String, String> = BTreeMap::new();
    let mut in_section = false;
    let mut section_seen = false;
    let mut current: Option<String> = None;

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_section = trimmed[1..trimmed.len() - 1].trim() == SECTION;
            section_seen |= in_section;
            current = None;
            continue;
        }
        if !in_section {
            continue;
        }
        // An indented, non-blank line continues the previous value.
        if line.starts_with(|c: char| c.is_whitespace()) && !trimmed.is_empty() {
            if let Some(key) = &current {
                if !trimmed.starts_with('#') {
                    let value = entries.entry(key.clone()).or_default();
                    value.push('\n');
                    value.push_str(trimmed);
                }
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((raw_key, raw_value)) = trimmed.split_once(['=', ':']) {
            let key = raw_key.trim().to_string();
            entries.insert(key.clone(), raw_value.trim().to_string());
            current = Some(key);
        }
    }

    section_seen.then_some(entries)
}

/// A multi-line value splits on newlines; a single-line value splits on `;`.
/// The single-line form therefore cannot carry environment markers, which is
/// a long-standing quirk of the format.
fn split_value(value: &str) -> Vec<String> {
    let parts: Vec<&str> = if value.contains('\n') {
        value.split('\n').collect()
    } else {
        value.split(';').collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}
