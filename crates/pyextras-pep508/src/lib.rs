//! Parsing and canonical formatting for Python [dependency
//! specifiers](https://packaging.python.org/en/latest/specifications/dependency-specifiers/)
//! (PEP 508).
//!
//! The parser accepts the specifier grammar, normalizes incidental whitespace,
//! lower-cases and sorts extras, and orders version clauses, so that every
//! equivalent spelling of a requirement prints the same way:
//!
//! ```
//! use std::str::FromStr;
//! use pyextras_pep508::Requirement;
//!
//! let requirement =
//!     Requirement::from_str("requests [tests, security]>=2.8.1 ; python_version > '3.8'")
//!         .unwrap();
//! assert_eq!(requirement.name, "requests");
//! assert_eq!(
//!     requirement.to_string(),
//!     r#"requests[security,tests]>=2.8.1; python_version > "3.8""#
//! );
//! ```
//!
//! Version values are kept opaque: clauses are checked for a known operator
//! and a plausible character set, not parsed as PEP 440 versions. This crate
//! formats requirements for display; it does not resolve them.

#![deny(missing_docs)]

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;
use unicode_width::UnicodeWidthChar;

pub use crate::marker::{MarkerExpression, MarkerOperator, MarkerTree, MarkerValue, MarkerVar};
pub use crate::validate::{validate_requirements, ValidationError};

use crate::cursor::Cursor;

mod cursor;
mod marker;
mod validate;

/// A parse error, with the span of the offending input.
#[derive(Debug)]
pub struct SpecifierError {
    /// What went wrong, either in our grammar or in the `url` crate.
    pub message: SpecifierErrorSource,
    /// Byte offset of the error span.
    pub start: usize,
    /// Byte length of the error span.
    pub len: usize,
    /// The complete input, for underlining.
    pub input: String,
}

/// The cause of a [`SpecifierError`].
#[derive(Debug, Error)]
pub enum SpecifierErrorSource {
    /// A grammar violation found by this parser.
    #[error("{0}")]
    Message(String),
    /// A direct-reference URL that did not parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Display for SpecifierError {
    /// The message followed by the input with the error span underlined.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let offset = self.input[..self.start.min(self.input.len())]
            .chars()
            .filter_map(UnicodeWidthChar::width)
            .sum::<usize>();
        let end = (self.start + self.len).min(self.input.len());
        let underline = if self.start >= end {
            1
        } else {
            self.input[self.start..end]
                .chars()
                .filter_map(UnicodeWidthChar::width)
                .sum::<usize>()
                .max(1)
        };
        write!(
            f,
            "{}\n{}\n{}{}",
            self.message,
            self.input,
            " ".repeat(offset),
            "^".repeat(underline)
        )
    }
}

impl std::error::Error for SpecifierError {}

/// A comparison operator in a version clause.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `~=`
    TildeEqual,
    /// `===`
    ArbitraryEqual,
}

impl Operator {
    /// Operators by parse precedence: longer spellings first, so that `===`
    /// is never read as `==` followed by garbage.
    const CANDIDATES: [(&'static str, Self); 8] = [
        ("===", Self::ArbitraryEqual),
        ("==", Self::Equal),
        ("~=", Self::TildeEqual),
        ("!=", Self::NotEqual),
        ("<=", Self::LessEqual),
        (">=", Self::GreaterEqual),
        ("<", Self::LessThan),
        (">", Self::GreaterThan),
    ];
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::TildeEqual => "~=",
            Self::ArbitraryEqual => "===",
        })
    }
}

/// One `operator version` clause, e.g. `>=1.18.4`.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct VersionSpecifier {
    /// The comparison operator.
    pub operator: Operator,
    /// The version value, verbatim apart from trimmed whitespace.
    pub version: String,
}

impl Display for VersionSpecifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.operator, self.version)
    }
}

/// The full set of version clauses of one requirement, kept sorted and
/// deduplicated so that clause order never leaks into the canonical form.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct VersionSpecifiers(Vec<VersionSpecifier>);

impl VersionSpecifiers {
    /// Sorts lexicographically by the formatted clause (`<2` before `>=3`,
    /// `!=` before both) and drops exact duplicates.
    fn from_unsorted(mut specifiers: Vec<VersionSpecifier>) -> Self {
        specifiers.sort_by_key(ToString::to_string);
        specifiers.dedup();
        Self(specifiers)
    }

    /// Iterate over the clauses in canonical order.
    pub fn iter(&self) -> std::slice::Iter<'_, VersionSpecifier> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a VersionSpecifiers {
    type Item = &'a VersionSpecifier;
    type IntoIter = std::slice::Iter<'a, VersionSpecifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for VersionSpecifiers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, specifier) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            specifier.fmt(f)?;
        }
        Ok(())
    }
}

/// Version clauses or a direct-reference URL; the grammar forbids both.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VersionOrUrl {
    /// A set of version clauses such as `!=1.0.0,>=0.25.0`.
    VersionSpecifier(VersionSpecifiers),
    /// A `name @ url` direct reference, kept verbatim for display. The text
    /// was checked against the `url` crate at parse time.
    Url(String),
}

/// One parsed dependency specifier.
///
/// Immutable value type; the canonical string form is a pure function of the
/// fields, and re-parsing it yields an equal `Requirement`.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Requirement {
    /// The package name, spelled as the author wrote it.
    pub name: String,
    /// Extras, lower-cased, sorted and deduplicated.
    pub extras: Vec<String>,
    /// Version clauses or a direct-reference URL, if any.
    pub version_or_url: Option<VersionOrUrl>,
    /// The environment marker, if any.
    pub marker: Option<MarkerTree>,
}

impl Requirement {
    /// The name with case folded and runs of `-`, `_`, `.` collapsed to `-`,
    /// for name comparisons across metadata sources.
    pub fn normalized_name(&self) -> String {
        let mut normalized = String::with_capacity(self.name.len());
        let mut hold = false;
        for char in self.name.chars() {
            if matches!(char, '-' | '_' | '.') {
                hold = true;
            } else {
                if hold && !normalized.is_empty() {
                    normalized.push('-');
                }
                hold = false;
                normalized.push(char.to_ascii_lowercase());
            }
        }
        normalized
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        let mut url_form = false;
        match &self.version_or_url {
            Some(VersionOrUrl::VersionSpecifier(specifiers)) => specifiers.fmt(f)?,
            Some(VersionOrUrl::Url(url)) => {
                write!(f, " @ {url}")?;
                url_form = true;
            }
            None => {}
        }
        if let Some(marker) = &self.marker {
            // After a URL the semicolon needs leading whitespace, or it would
            // be read back as part of the URL.
            if url_form {
                write!(f, " ; {marker}")?;
            } else {
                write!(f, "; {marker}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = SpecifierError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse(&mut Cursor::new(input))
    }
}

fn grammar_error(cursor: &Cursor, message: String, start: usize, len: usize) -> SpecifierError {
    SpecifierError {
        message: SpecifierErrorSource::Message(message),
        start,
        len,
        input: cursor.input().to_string(),
    }
}

/// `identifier = letterOrDigit (letterOrDigit | '-' | '_' | '.')*`, with the
/// extra rule that the final character must be alphanumeric again.
fn parse_name(cursor: &mut Cursor) -> Result<String, SpecifierError> {
    let mut name = String::new();
    match cursor.next() {
        Some((_, char)) if char.is_ascii_alphanumeric() => name.push(char),
        Some((pos, char)) => {
            return Err(grammar_error(
                cursor,
                format!("Expected package name starting with an alphanumeric character, found '{char}'"),
                pos,
                char.len_utf8(),
            ));
        }
        None => {
            return Err(grammar_error(
                cursor,
                "Expected package name, found end of dependency specification".to_string(),
                0,
                1,
            ));
        }
    }
    let mut last = None;
    while let Some((pos, char)) = cursor.peek() {
        if char.is_ascii_alphanumeric() || matches!(char, '-' | '_' | '.') {
            name.push(char);
            last = Some((pos, char));
            cursor.next();
        } else {
            break;
        }
    }
    if let Some((pos, char @ ('-' | '_' | '.'))) = last {
        return Err(grammar_error(
            cursor,
            format!("Package name must end with an alphanumeric character, not '{char}'"),
            pos,
            char.len_utf8(),
        ));
    }
    Ok(name)
}

/// Extras in `[extra1, extra2]` form. `[]` is allowed and means no extras.
fn parse_extras(cursor: &mut Cursor) -> Result<Vec<String>, SpecifierError> {
    let Some(bracket_pos) = cursor.eat_char('[') else {
        return Ok(Vec::new());
    };
    let mut extras = Vec::new();
    loop {
        cursor.eat_whitespace();
        if extras.is_empty() && cursor.eat_char(']').is_some() {
            break;
        }
        let mut buffer = String::new();
        match cursor.next() {
            Some((_, char)) if char.is_ascii_alphanumeric() => buffer.push(char),
            Some((pos, char)) => {
                return Err(grammar_error(
                    cursor,
                    format!(
                        "Expected an alphanumeric character starting the extra name, found '{char}'"
                    ),
                    pos,
                    char.len_utf8(),
                ));
            }
            None => {
                return Err(grammar_error(
                    cursor,
                    "Missing closing bracket (expected ']', found end of dependency specification)"
                        .to_string(),
                    bracket_pos,
                    1,
                ));
            }
        }
        let (start, len) = cursor
            .take_while(|char| char.is_ascii_alphanumeric() || matches!(char, '-' | '_' | '.'));
        buffer.push_str(cursor.slice(start, len));
        cursor.eat_whitespace();
        match cursor.next() {
            Some((_, ',')) => extras.push(buffer.to_lowercase()),
            Some((_, ']')) => {
                extras.push(buffer.to_lowercase());
                break;
            }
            Some((pos, char)) => {
                return Err(grammar_error(
                    cursor,
                    format!(
                        "Expected either ',' (separating extras) or ']' (ending the extras), found '{char}'"
                    ),
                    pos,
                    char.len_utf8(),
                ));
            }
            None => {
                return Err(grammar_error(
                    cursor,
                    "Missing closing bracket (expected ']', found end of dependency specification)"
                        .to_string(),
                    bracket_pos,
                    1,
                ));
            }
        }
    }
    extras.sort();
    extras.dedup();
    Ok(extras)
}

/// One `operator version` clause out of a comma-separated list.
fn parse_specifier(
    cursor: &Cursor,
    buffer: &str,
    start: usize,
    end: usize,
) -> Result<VersionSpecifier, SpecifierError> {
    let clause = buffer.trim();
    let span = (end - start).max(1);
    if clause.is_empty() {
        return Err(grammar_error(
            cursor,
            "Empty version clause".to_string(),
            start,
            span,
        ));
    }
    let Some((operator, rest)) = Operator::CANDIDATES
        .iter()
        .find_map(|(text, operator)| clause.strip_prefix(text).map(|rest| (*operator, rest)))
    else {
        return Err(grammar_error(
            cursor,
            format!(
                "Expected a version operator (==, !=, <=, >=, <, >, ~= or ===), found '{clause}'"
            ),
            start,
            span,
        ));
    };
    let version = rest.trim();
    if version.is_empty() {
        return Err(grammar_error(
            cursor,
            format!("Missing version after '{operator}'"),
            start,
            span,
        ));
    }
    if let Some(char) = version
        .chars()
        .find(|char| !char.is_ascii_alphanumeric() && !matches!(char, '.' | '*' | '+' | '!' | '_' | '-'))
    {
        return Err(grammar_error(
            cursor,
            format!("Invalid character '{char}' in version '{version}'"),
            start,
            span,
        ));
    }
    Ok(VersionSpecifier {
        operator,
        version: version.to_string(),
    })
}

/// `version_one (wsp* ',' version_one)*`, ended by `;` or end of input.
fn parse_version_specifiers(cursor: &mut Cursor) -> Result<VersionSpecifiers, SpecifierError> {
    let mut start = cursor.pos();
    let mut buffer = String::new();
    let mut specifiers = Vec::new();
    loop {
        match cursor.peek() {
            Some((end, ',')) => {
                specifiers.push(parse_specifier(cursor, &buffer, start, end)?);
                buffer.clear();
                cursor.next();
                start = end + 1;
            }
            Some((_, ';')) | None => {
                let end = cursor.pos();
                specifiers.push(parse_specifier(cursor, &buffer, start, end)?);
                break;
            }
            Some((_, char)) => {
                buffer.push(char);
                cursor.next();
            }
        }
    }
    Ok(VersionSpecifiers::from_unsorted(specifiers))
}

/// The parenthesized variant, `('(' version_one (wsp* ',' version_one)* ')')`.
fn parse_version_specifiers_parenthesized(
    cursor: &mut Cursor,
) -> Result<VersionSpecifiers, SpecifierError> {
    let paren_pos = cursor.pos();
    cursor.next();
    cursor.eat_whitespace();
    let mut start = cursor.pos();
    let mut buffer = String::new();
    let mut specifiers = Vec::new();
    loop {
        match cursor.next() {
            Some((end, ',')) => {
                specifiers.push(parse_specifier(cursor, &buffer, start, end)?);
                buffer.clear();
                start = end + 1;
            }
            Some((end, ')')) => {
                specifiers.push(parse_specifier(cursor, &buffer, start, end)?);
                break;
            }
            Some((_, char)) => buffer.push(char),
            None => {
                return Err(grammar_error(
                    cursor,
                    "Missing closing parenthesis (expected ')', found end of dependency specification)"
                        .to_string(),
                    paren_pos,
                    1,
                ));
            }
        }
    }
    Ok(VersionSpecifiers::from_unsorted(specifiers))
}

/// The URL of a direct reference: everything up to the next whitespace.
///
/// A marker after a URL therefore needs whitespace before its `;`, or the
/// semicolon is swallowed by the URL, exactly as the grammar demands.
fn parse_url(cursor: &mut Cursor) -> Result<String, SpecifierError> {
    cursor.eat_whitespace();
    let (start, len) = cursor.take_while(|char| !char.is_whitespace());
    if len == 0 {
        return Err(grammar_error(
            cursor,
            "Expected URL after '@'".to_string(),
            start,
            1,
        ));
    }
    let given = cursor.slice(start, len);
    // Validate the syntax, but keep the author's spelling for display: the
    // `url` crate would add trailing slashes and escape freely.
    url::Url::parse(given).map_err(|err| SpecifierError {
        message: SpecifierErrorSource::Url(err),
        start,
        len,
        input: cursor.input().to_string(),
    })?;
    Ok(given.to_string())
}

/// `specification = wsp* name wsp* extras? wsp* (urlspec | versionspec)? wsp* quoted_marker? wsp*`
fn parse(cursor: &mut Cursor) -> Result<Requirement, SpecifierError> {
    cursor.eat_whitespace();
    let name = parse_name(cursor)?;
    cursor.eat_whitespace();
    let extras = parse_extras(cursor)?;
    cursor.eat_whitespace();
    let version_or_url = match cursor.peek() {
        Some((_, '@')) => {
            cursor.next();
            Some(VersionOrUrl::Url(parse_url(cursor)?))
        }
        Some((_, '(')) => Some(VersionOrUrl::VersionSpecifier(
            parse_version_specifiers_parenthesized(cursor)?,
        )),
        Some((_, '<' | '>' | '=' | '!' | '~')) => Some(VersionOrUrl::VersionSpecifier(
            parse_version_specifiers(cursor)?,
        )),
        Some((_, ';')) | None => None,
        Some((pos, other)) => {
            return Err(grammar_error(
                cursor,
                format!(
                    "Expected one of '@', '(', a version operator or ';', found '{other}'"
                ),
                pos,
                other.len_utf8(),
            ));
        }
    };
    cursor.eat_whitespace();
    let marker = if cursor.eat_char(';').is_some() {
        Some(marker::parse_markers(cursor)?)
    } else {
        None
    };
    cursor.eat_whitespace();
    if let Some((pos, unexpected)) = cursor.next() {
        let expected = if marker.is_some() {
            "'and', 'or' or end of input"
        } else {
            "end of dependency specification or the start of a marker (';')"
        };
        return Err(grammar_error(
            cursor,
            format!("Unexpected character '{unexpected}', expected {expected}"),
            pos,
            cursor.input().len() - pos,
        ));
    }
    Ok(Requirement {
        name,
        extras,
        version_or_url,
        marker,
    })
}
