//! The `__pkginfo__` source: an `extras_require` mapping in a `__pkginfo__.py`
//! module at the repository root.
//!
//! Executing a Python module to read one mapping out of it is neither
//! desirable nor necessary, so the assignment is treated as a restricted data
//! format instead: the reader scans the file for a top-level
//! `extras_require = {...}` statement and parses the literal, a dict of
//! string keys to lists of strings, with optional trailing commas and `#`
//! comments. Anything else in the file is ignored.

use std::collections::BTreeMap;
use std::path::Path;

use fs_err as fs;

use crate::{Context, Options, SourceError};

pub(crate) fn requirements_from_pkginfo(
    _package_root: &Path,
    _options: &Options,
    context: &Context,
    extra: &str,
) -> Result<Vec<String>, SourceError> {
    let path = context.repo_root().join("__pkginfo__.py");
    if !path.is_file() {
        return Err(SourceError::NotFound {
            name: "__pkginfo__.py".to_string(),
            dir: context.repo_root().to_path_buf(),
        });
    }
    let text = fs::read_to_string(&path).map_err(|err| SourceError::ImportFailure {
        reason: err.to_string(),
    })?;
    let extras_require = parse_extras_require(&text)
        .map_err(|reason| SourceError::ImportFailure { reason })?;
    extras_require
        .get(extra)
        .cloned()
        .ok_or_else(|| SourceError::KeyMissing {
            extra: extra.to_string(),
            table: "extras_require",
        })
}

/// Finds the `extras_require` assignment and parses its dict literal.
fn parse_extras_require(source: &str) -> Result<BTreeMap<String, Vec<String>>, String> {
    let mut offset = 0;
    while let Some(found) = source[offset..].find("extras_require") {
        let start = offset + found;
        offset = start + "extras_require".len();
        // Only a top-level assignment counts: the name must sit at the start
        // of a line.
        if start > 0 && source.as_bytes()[start - 1] != b'\n' {
            continue;
        }
        let mut scanner = Scanner::new(source, offset);
        scanner.skip_trivia();
        if scanner.bump_if('=') {
            // Guard against `==` comparisons.
            if scanner.peek() == Some('=') {
                continue;
            }
            scanner.skip_trivia();
            return scanner.parse_dict();
        }
    }
    Err("no 'extras_require = {...}' assignment found".to_string())
}

/// A minimal scanner over the Python literal subset the assignment uses.
struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str, pos: usize) -> Self {
        Self { source, pos }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let char = self.peek()?;
        self.pos += char.len_utf8();
        Some(char)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Skips whitespace (including newlines) and `#` comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(char) if char.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(char) = self.bump() {
                        if char == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        match self.bump() {
            Some(char) if char == expected => Ok(()),
            Some(char) => Err(format!("expected '{expected}', found '{char}'")),
            None => Err(format!("expected '{expected}', found end of file")),
        }
    }

    /// A single- or double-quoted Python string with simple escapes.
    fn parse_string(&mut self) -> Result<String, String> {
        let quote = match self.bump() {
            Some(quote @ ('"' | '\'')) => quote,
            Some(char) => return Err(format!("expected a string literal, found '{char}'")),
            None => return Err("expected a string literal, found end of file".to_string()),
        };
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(escaped @ ('\\' | '\'' | '"')) => value.push(escaped),
                    Some(other) => {
                        // Python keeps unknown escapes verbatim.
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err("unterminated string literal".to_string()),
                },
                Some(char) if char == quote => return Ok(value),
                Some('\n') | None => return Err("unterminated string literal".to_string()),
                Some(char) => value.push(char),
            }
        }
    }

    /// `[ "entry", ... ]` with an optional trailing comma.
    fn parse_list(&mut self) -> Result<Vec<String>, String> {
        self.expect('[')?;
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            if self.bump_if(']') {
                return Ok(entries);
            }
            entries.push(self.parse_string()?);
            self.skip_trivia();
            if !self.bump_if(',') {
                self.expect(']')?;
                return Ok(entries);
            }
        }
    }

    /// `{ "extra": [...], ... }` with an optional trailing comma.
    fn parse_dict(&mut self) -> Result<BTreeMap<String, Vec<String>>, String> {
        self.expect('{')?;
        let mut mapping = BTreeMap::new();
        loop {
            self.skip_trivia();
            if self.bump_if('}') {
                return Ok(mapping);
            }
            let key = self.parse_string()?;
            self.skip_trivia();
            self.expect(':')?;
            self.skip_trivia();
            let value = self.parse_list()?;
            mapping.insert(key, value);
            self.skip_trivia();
            if !self.bump_if(',') {
                self.expect('}')?;
                return Ok(mapping);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indoc::indoc;
    use tempfile::TempDir;

    use crate::{Context, Options, SourceError};

    use super::{parse_extras_require, requirements_from_pkginfo};

    fn read(tmp: &TempDir, extra: &str) -> Result<Vec<String>, SourceError> {
        let context = Context::new(tmp.path().join("docs"));
        requirements_from_pkginfo(tmp.path(), &Options::new(), &context, extra)
    }

    #[test]
    fn reads_the_named_extra() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("__pkginfo__.py"),
            r#"extras_require = {"extra_c": ["faker", "pytest", "tox; python<=3.6"]}"#,
        )
        .unwrap();
        assert_eq!(
            read(&tmp, "extra_c").unwrap(),
            ["faker", "pytest", "tox; python<=3.6"]
        );
    }

    #[test]
    fn entries_come_back_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("__pkginfo__.py"),
            indoc! {r#"
                #  This file is managed by 'repo_helper'.
                __version__ = "1.2.3"

                extras_require = {
                    "extra_b": [
                        "flask >=1.1.2",
                        "click<7.1.2",
                        "sphinx ==3.0.3",
                    ],
                }
            "#},
        )
        .unwrap();
        // No normalization at the reader boundary; that is the validator's job.
        assert_eq!(
            read(&tmp, "extra_b").unwrap(),
            ["flask >=1.1.2", "click<7.1.2", "sphinx ==3.0.3"]
        );
    }

    #[test]
    fn missing_module() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read(&tmp, "extra").unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
        assert!(err.to_string().starts_with("Cannot find __pkginfo__.py in"));
    }

    #[test]
    fn binary_module_is_an_import_failure() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("__pkginfo__.py"),
            [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        )
        .unwrap();
        let err = read(&tmp, "extra").unwrap_err();
        assert!(matches!(err, SourceError::ImportFailure { .. }));
        assert!(err.to_string().starts_with("Could not import __pkginfo__.py"));
    }

    #[test]
    fn missing_extra_key_is_distinct_from_import_failure() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("__pkginfo__.py"),
            r#"extras_require = {"extra_c": ["faker"]}"#,
        )
        .unwrap();
        let err = read(&tmp, "docs").unwrap_err();
        assert!(matches!(err, SourceError::KeyMissing { .. }));
        assert_eq!(err.to_string(), "'docs' not found in 'extras_require'");
    }

    #[test]
    fn parses_single_quotes_comments_and_trailing_commas() {
        let mapping = parse_extras_require(indoc! {"
            extras_require = {
                'a': ['one', 'two',],  # trailing comma
                'b': [],
            }
        "})
        .unwrap();
        assert_eq!(mapping["a"], ["one", "two"]);
        assert!(mapping["b"].is_empty());
    }

    #[test]
    fn ignores_mentions_that_are_not_assignments() {
        let err = parse_extras_require("# extras_require = {}\nprint(extras_require)\n");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_malformed_literals() {
        assert!(parse_extras_require("extras_require = {'a': 'not-a-list'}").is_err());
        assert!(parse_extras_require("extras_require = [1]").is_err());
        assert!(parse_extras_require("extras_require = {'a': ['unterminated}").is_err());
    }
}
