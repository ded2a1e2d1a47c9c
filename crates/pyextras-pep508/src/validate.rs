//! Validation of a whole requirement list: the step between a metadata source
//! handing over raw strings and the notice renderer printing them.

use std::collections::BTreeSet;
use std::str::FromStr;

use thiserror::Error;

use crate::{Requirement, SpecifierError};

/// Why a requirement list was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// An entry did not parse. The whole list is rejected; there is no
    /// skip-and-warn mode.
    #[error("Invalid requirement '{requirement}': {source}")]
    InvalidRequirement {
        /// The entry, as supplied.
        requirement: String,
        /// The parse error, with its span.
        source: SpecifierError,
    },
    /// Nothing was left after dropping blank entries.
    #[error("Please supply at least one requirement.")]
    Empty,
}

/// Parses every entry and returns the canonical forms, deduplicated and
/// sorted ascending (byte order, so case-sensitive on the name).
///
/// Blank and whitespace-only entries are dropped silently; any entry that
/// fails to parse aborts the validation and names the offender.
pub fn validate_requirements<I, S>(requirements: I) -> Result<Vec<String>, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut canonical = BTreeSet::new();
    for entry in requirements {
        let entry = entry.as_ref().trim();
        if entry.is_empty() {
            continue;
        }
        let requirement =
            Requirement::from_str(entry).map_err(|source| ValidationError::InvalidRequirement {
                requirement: entry.to_string(),
                source,
            })?;
        canonical.insert(requirement.to_string());
    }
    if canonical.is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(canonical.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::{validate_requirements, ValidationError};

    #[test]
    fn sorts_by_canonical_form() {
        assert_eq!(
            validate_requirements(["b>=1", "a"]).unwrap(),
            ["a", "b>=1"]
        );
    }

    #[test]
    fn canonicalizes_multi_clause_entries() {
        assert_eq!(
            validate_requirements(["name>=3,<2"]).unwrap(),
            ["name<2,>=3"]
        );
    }

    #[test]
    fn canonicalizes_extras() {
        assert_eq!(
            validate_requirements(["foobar [quux,bar]"]).unwrap(),
            ["foobar[bar,quux]"]
        );
        assert_eq!(validate_requirements(["foo[]"]).unwrap(), ["foo"]);
    }

    #[test]
    fn keeps_input_order_out_of_the_result() {
        assert_eq!(
            validate_requirements([
                "pytz<1.2",
                "certifi>0.1,!=2.0.1,<3.0",
                "numpy; platform_system!='Darwin'",
            ])
            .unwrap(),
            [
                "certifi!=2.0.1,<3.0,>0.1",
                "numpy; platform_system != \"Darwin\"",
                "pytz<1.2",
            ]
        );
    }

    #[test]
    fn drops_blank_entries_and_duplicates() {
        assert_eq!(
            validate_requirements(["", "  ", "docutils", "docutils", "\t"]).unwrap(),
            ["docutils"]
        );
    }

    #[test]
    fn rejects_invalid_entries() {
        let err = validate_requirements(["docutils", "foo!"]).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidRequirement { ref requirement, .. } if requirement == "foo!"
        ));
        assert!(err.to_string().starts_with("Invalid requirement 'foo!':"));
    }

    #[test]
    fn rejects_an_empty_set() {
        assert!(matches!(
            validate_requirements(["", "   "]),
            Err(ValidationError::Empty)
        ));
        assert!(matches!(
            validate_requirements::<[&str; 0], &str>([]),
            Err(ValidationError::Empty)
        ));
    }
}
