//! Environment markers, the `; python_version < "3.8"` tail of a dependency
//! specifier.
//!
//! Markers restrict a requirement to specific environments. This module keeps
//! a purely syntactic model: expressions are parsed, the variable names are
//! validated against the dependency-specifier grammar, and the tree can be
//! re-serialized in one canonical spacing. Evaluating markers against a target
//! environment is a resolver concern and has no place here.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use tracing::warn;

use crate::cursor::Cursor;
use crate::{SpecifierError, SpecifierErrorSource};

/// One of the environment variables the marker grammar defines.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum MarkerVar {
    /// `implementation_name`
    ImplementationName,
    /// `implementation_version`
    ImplementationVersion,
    /// `os_name`
    OsName,
    /// `platform_machine`
    PlatformMachine,
    /// `platform_python_implementation`
    PlatformPythonImplementation,
    /// `platform_release`
    PlatformRelease,
    /// `platform_system`
    PlatformSystem,
    /// `platform_version`
    PlatformVersion,
    /// `python_full_version`
    PythonFullVersion,
    /// `python_version`
    PythonVersion,
    /// `sys_platform`
    SysPlatform,
    /// `extra`, the variable this whole tool revolves around
    Extra,
}

impl FromStr for MarkerVar {
    type Err = ();

    /// Accepts the current spellings plus the deprecated dotted aliases, which
    /// are normalized to their replacements.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let var = match s {
            "implementation_name" => Self::ImplementationName,
            "implementation_version" => Self::ImplementationVersion,
            "os_name" => Self::OsName,
            "platform_machine" => Self::PlatformMachine,
            "platform_python_implementation" => Self::PlatformPythonImplementation,
            "platform_release" => Self::PlatformRelease,
            "platform_system" => Self::PlatformSystem,
            "platform_version" => Self::PlatformVersion,
            "python_full_version" => Self::PythonFullVersion,
            "python_version" => Self::PythonVersion,
            "sys_platform" => Self::SysPlatform,
            "extra" => Self::Extra,
            "os.name" | "sys.platform" | "platform.version" | "platform.machine" => {
                let replacement = s.replace('.', "_");
                warn!("The marker variable '{s}' is deprecated, use '{replacement}' instead");
                return replacement.parse();
            }
            "platform.python_implementation" | "python_implementation" => {
                warn!(
                    "The marker variable '{s}' is deprecated, use \
                     'platform_python_implementation' instead"
                );
                Self::PlatformPythonImplementation
            }
            _ => return Err(()),
        };
        Ok(var)
    }
}

impl Display for MarkerVar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ImplementationName => "implementation_name",
            Self::ImplementationVersion => "implementation_version",
            Self::OsName => "os_name",
            Self::PlatformMachine => "platform_machine",
            Self::PlatformPythonImplementation => "platform_python_implementation",
            Self::PlatformRelease => "platform_release",
            Self::PlatformSystem => "platform_system",
            Self::PlatformVersion => "platform_version",
            Self::PythonFullVersion => "python_full_version",
            Self::PythonVersion => "python_version",
            Self::SysPlatform => "sys_platform",
            Self::Extra => "extra",
        })
    }
}

/// Either side of a marker comparison: a variable or a quoted string.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum MarkerValue {
    /// An environment variable such as `python_version`.
    Variable(MarkerVar),
    /// A user-supplied constant, stored without its quotes.
    String(String),
}

impl Display for MarkerValue {
    /// Strings are double-quoted, falling back to single quotes when the value
    /// itself contains a double quote.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Variable(var) => var.fmt(f),
            Self::String(value) => {
                if value.contains('"') {
                    write!(f, "'{value}'")
                } else {
                    write!(f, "\"{value}\"")
                }
            }
        }
    }
}

/// A comparison operator in a marker expression.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum MarkerOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessEqual,
    /// `~=`
    TildeEqual,
    /// `===`
    ArbitraryEqual,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

impl FromStr for MarkerOperator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let operator = match s {
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessEqual,
            "~=" => Self::TildeEqual,
            "===" => Self::ArbitraryEqual,
            "in" => Self::In,
            _ => return Err(()),
        };
        Ok(operator)
    }
}

impl Display for MarkerOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::TildeEqual => "~=",
            Self::ArbitraryEqual => "===",
            Self::In => "in",
            Self::NotIn => "not in",
        })
    }
}

/// A single `lhs op rhs` comparison.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct MarkerExpression {
    /// The left-hand value.
    pub l_value: MarkerValue,
    /// The comparison operator.
    pub operator: MarkerOperator,
    /// The right-hand value.
    pub r_value: MarkerValue,
}

impl Display for MarkerExpression {
    /// Exactly one space on each side of the operator, whatever the input had.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.l_value, self.operator, self.r_value)
    }
}

/// The boolean structure of a marker: expressions joined by `and`/`or`.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum MarkerTree {
    /// A leaf comparison such as `python_version > "3.8"`.
    Expression(MarkerExpression),
    /// A conjunction of nested markers.
    And(Vec<MarkerTree>),
    /// A disjunction of nested markers.
    Or(Vec<MarkerTree>),
}

impl Display for MarkerTree {
    /// Minimal parentheses: `and` binds tighter than `or`, so only an `or`
    /// group nested inside an `and` needs them.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expression(expression) => expression.fmt(f),
            Self::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    if matches!(child, Self::Or(_)) {
                        write!(f, "({child})")?;
                    } else {
                        child.fmt(f)?;
                    }
                }
                Ok(())
            }
            Self::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    child.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for MarkerTree {
    type Err = SpecifierError;

    fn from_str(markers: &str) -> Result<Self, Self::Err> {
        let mut cursor = Cursor::new(markers);
        let marker = parse_markers(&mut cursor)?;
        cursor.eat_whitespace();
        if let Some((pos, unexpected)) = cursor.next() {
            return Err(SpecifierError {
                message: SpecifierErrorSource::Message(format!(
                    "Unexpected character '{unexpected}', expected 'and', 'or' or end of input"
                )),
                start: pos,
                len: cursor.input().len() - pos,
                input: cursor.input().to_string(),
            });
        }
        Ok(marker)
    }
}

/// `marker = marker_or`, with anything left over reported by the caller.
pub(crate) fn parse_markers(cursor: &mut Cursor) -> Result<MarkerTree, SpecifierError> {
    parse_marker_or(cursor)
}

fn parse_marker_or(cursor: &mut Cursor) -> Result<MarkerTree, SpecifierError> {
    parse_marker_junction(cursor, "or", MarkerTree::Or, parse_marker_and)
}

fn parse_marker_and(cursor: &mut Cursor) -> Result<MarkerTree, SpecifierError> {
    parse_marker_junction(cursor, "and", MarkerTree::And, parse_marker_atom)
}

/// Shared loop for `x (op x)*`, collapsing a single element to itself.
fn parse_marker_junction(
    cursor: &mut Cursor,
    op: &str,
    constructor: fn(Vec<MarkerTree>) -> MarkerTree,
    parse_inner: fn(&mut Cursor) -> Result<MarkerTree, SpecifierError>,
) -> Result<MarkerTree, SpecifierError> {
    let mut children = vec![parse_inner(cursor)?];
    loop {
        cursor.eat_whitespace();
        // Peek the next word without consuming it; it is only ours if it is
        // the operator we're collecting.
        let lookahead = cursor.clone().take_while(|c| !c.is_whitespace());
        if cursor.slice(lookahead.0, lookahead.1) != op {
            break;
        }
        cursor.take_while(|c| !c.is_whitespace());
        children.push(parse_inner(cursor)?);
    }
    if children.len() == 1 {
        Ok(children.remove(0))
    } else {
        Ok(constructor(children))
    }
}

/// A parenthesized group or a single comparison.
fn parse_marker_atom(cursor: &mut Cursor) -> Result<MarkerTree, SpecifierError> {
    cursor.eat_whitespace();
    if let Some(open_pos) = cursor.eat_char('(') {
        let marker = parse_marker_or(cursor)?;
        cursor.eat_whitespace();
        if cursor.eat_char(')').is_none() {
            return Err(SpecifierError {
                message: SpecifierErrorSource::Message(
                    "Missing closing parenthesis in marker".to_string(),
                ),
                start: open_pos,
                len: 1,
                input: cursor.input().to_string(),
            });
        }
        Ok(marker)
    } else {
        Ok(MarkerTree::Expression(parse_marker_expression(cursor)?))
    }
}

/// `marker_var marker_op marker_var`
fn parse_marker_expression(cursor: &mut Cursor) -> Result<MarkerExpression, SpecifierError> {
    cursor.eat_whitespace();
    let l_value = parse_marker_value(cursor)?;
    cursor.eat_whitespace();
    let operator = parse_marker_operator(cursor)?;
    cursor.eat_whitespace();
    let r_value = parse_marker_value(cursor)?;
    Ok(MarkerExpression {
        l_value,
        operator,
        r_value,
    })
}

/// A single- or double-quoted string, or a known variable name.
fn parse_marker_value(cursor: &mut Cursor) -> Result<MarkerValue, SpecifierError> {
    match cursor.peek() {
        None => Err(SpecifierError {
            message: SpecifierErrorSource::Message(
                "Expected marker value, found end of dependency specification".to_string(),
            ),
            start: cursor.pos(),
            len: 1,
            input: cursor.input().to_string(),
        }),
        Some((quote_pos, quote @ ('"' | '\''))) => {
            cursor.next();
            let (start, len) = cursor.take_while(|c| c != quote);
            let value = cursor.slice(start, len).to_string();
            if cursor.eat_char(quote).is_none() {
                return Err(SpecifierError {
                    message: SpecifierErrorSource::Message(format!(
                        "Unterminated string (expected closing {quote})"
                    )),
                    start: quote_pos,
                    len: 1,
                    input: cursor.input().to_string(),
                });
            }
            Ok(MarkerValue::String(value))
        }
        Some(_) => {
            let (start, len) = cursor.take_while(|c| {
                !c.is_whitespace() && !matches!(c, '>' | '=' | '<' | '!' | '~' | ')')
            });
            let name = cursor.slice(start, len);
            let var = MarkerVar::from_str(name).map_err(|()| SpecifierError {
                message: SpecifierErrorSource::Message(format!(
                    "Expected a quoted string or a valid marker name, found '{name}'"
                )),
                start,
                len,
                input: cursor.input().to_string(),
            })?;
            Ok(MarkerValue::Variable(var))
        }
    }
}

/// A comparison operator, including the two-word `not in`.
fn parse_marker_operator(cursor: &mut Cursor) -> Result<MarkerOperator, SpecifierError> {
    let (start, len) =
        cursor.take_while(|c| !c.is_whitespace() && c != '\'' && c != '"');
    let operator = cursor.slice(start, len);
    if operator == "not" {
        cursor.eat_whitespace();
        let (in_start, in_len) = cursor.take_while(|c| !c.is_whitespace());
        if cursor.slice(in_start, in_len) != "in" {
            return Err(SpecifierError {
                message: SpecifierErrorSource::Message(
                    "Expected 'in' after 'not' in marker operator".to_string(),
                ),
                start: in_start,
                len: in_len.max(1),
                input: cursor.input().to_string(),
            });
        }
        return Ok(MarkerOperator::NotIn);
    }
    MarkerOperator::from_str(operator).map_err(|()| SpecifierError {
        message: SpecifierErrorSource::Message(format!(
            "Expected a valid marker operator (such as '>=' or 'not in'), found '{operator}'"
        )),
        start,
        len,
        input: cursor.input().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::MarkerTree;

    #[test_case("os_name=='a'", r#"os_name == "a""#; "respace and requote")]
    #[test_case(
        "python_version<'2.7' and platform_version=='2'",
        r#"python_version < "2.7" and platform_version == "2""#;
        "conjunction"
    )]
    #[test_case(
        "os_name=='a' and os_name=='b' or os_name=='c'",
        r#"os_name == "a" and os_name == "b" or os_name == "c""#;
        "and binds tighter than or"
    )]
    #[test_case(
        "(os_name=='a' or os_name=='b') and os_name=='c'",
        r#"(os_name == "a" or os_name == "b") and os_name == "c""#;
        "grouped or keeps parens"
    )]
    #[test_case(
        "(os_name=='a' and os_name=='b') or os_name=='c'",
        r#"os_name == "a" and os_name == "b" or os_name == "c""#;
        "redundant parens dropped"
    )]
    #[test_case("'win' in sys_platform", r#""win" in sys_platform"#; "in operator")]
    #[test_case("'win32' not  in sys_platform", r#""win32" not in sys_platform"#; "not in operator")]
    #[test_case("os.name == 'posix'", r#"os_name == "posix""#; "deprecated dotted name")]
    fn canonical(input: &str, expected: &str) {
        let marker = MarkerTree::from_str(input).unwrap();
        assert_eq!(marker.to_string(), expected);
        // Canonical output must survive a round trip unchanged.
        assert_eq!(
            MarkerTree::from_str(expected).unwrap().to_string(),
            expected
        );
    }

    #[test_case("foobar == 'x'"; "unknown variable")]
    #[test_case("os_name == "; "missing right-hand side")]
    #[test_case("os_name ?? 'a'"; "unknown operator")]
    #[test_case("os_name == 'a' and"; "dangling and")]
    #[test_case("(os_name == 'a'"; "unclosed paren")]
    #[test_case("os_name == 'a"; "unterminated string")]
    fn invalid(input: &str) {
        assert!(MarkerTree::from_str(input).is_err());
    }
}
