//! Application version matching.
//!
//! Version names are matched with Ivy-style constraints:
//!
//! | Constraint     | Matches                                   |
//! |----------------|-------------------------------------------|
//! | `1.0`          | `1.0`, `1.0.0`, `1.0-SNAPSHOT`            |
//! | `1.0.+`        | anything starting with `1.0.`             |
//! | `[1.0,2.0]`    | 1.0 through 2.0 inclusive                 |
//! | `[1.0,2.0)`    | 1.0 up to but excluding 2.0               |
//! | `[1.0,)`       | 1.0 and later                             |
//!
//! Only the first three numeric components take part in comparisons.

use crate::device::DeviceState;
use inapp_types::{Error, Result, VersionPredicate};
use tracing::warn;

type Components = [u64; 3];

/// One end of a version range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub version: [u64; 3],
    pub inclusive: bool,
}

/// A parsed version name constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Exact version. Qualifiers on the candidate are ignored.
    Exact([u64; 3]),
    /// Candidate must start with the prefix. `+` alone matches anything.
    Prefix(String),
    /// Range with optional open ends.
    Range {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
}

impl VersionConstraint {
    /// Parses a constraint, ignoring surrounding whitespace.
    pub fn parse(constraint: &str) -> Result<Self> {
        let constraint = constraint.trim();
        if constraint.is_empty() {
            return Err(Error::InvalidVersion("empty constraint".into()));
        }

        if let Some(prefix) = constraint.strip_suffix('+') {
            return Ok(Self::Prefix(prefix.trim().to_string()));
        }

        let first = constraint.chars().next();
        let last = constraint.chars().last();
        match (first, last) {
            (Some(open @ ('[' | '(' | ']')), Some(close @ (']' | ')' | '[')))
                if constraint.len() >= 2 =>
            {
                Self::parse_range(constraint, open, close)
            }
            _ => Ok(Self::Exact(parse_strict(constraint)?)),
        }
    }

    fn parse_range(constraint: &str, open: char, close: char) -> Result<Self> {
        let inner = &constraint[1..constraint.len() - 1];
        let mut parts = inner.split(',');
        let (Some(lower), Some(upper), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::InvalidVersion(format!(
                "expected two range bounds: {constraint}"
            )));
        };

        let lower = parse_bound(lower, open == '[')?;
        let upper = parse_bound(upper, close == ']')?;
        if lower.is_none() && upper.is_none() {
            return Err(Error::InvalidVersion(format!(
                "range has no bounds: {constraint}"
            )));
        }
        Ok(Self::Range { lower, upper })
    }

    /// Returns true if the version name satisfies the constraint.
    pub fn matches(&self, version: &str) -> bool {
        let version = version.trim();
        match self {
            Self::Prefix(prefix) => version.starts_with(prefix.as_str()),
            Self::Exact(expected) => parse_lenient(version).is_some_and(|v| v == *expected),
            Self::Range { lower, upper } => {
                let Some(candidate) = parse_lenient(version) else {
                    return false;
                };
                let above = lower.is_none_or(|bound| {
                    if bound.inclusive {
                        candidate >= bound.version
                    } else {
                        candidate > bound.version
                    }
                });
                let below = upper.is_none_or(|bound| {
                    if bound.inclusive {
                        candidate <= bound.version
                    } else {
                        candidate < bound.version
                    }
                });
                above && below
            }
        }
    }
}

fn parse_bound(value: &str, inclusive: bool) -> Result<Option<Bound>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Bound {
        version: parse_strict(value)?,
        inclusive,
    }))
}

/// Parses a constraint version; every component must be numeric.
fn parse_strict(value: &str) -> Result<Components> {
    let mut components = [0u64; 3];
    for (index, part) in value.split('.').enumerate() {
        let number = part
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::InvalidVersion(format!("non-numeric component in {value}")))?;
        if let Some(slot) = components.get_mut(index) {
            *slot = number;
        }
    }
    Ok(components)
}

/// Parses a candidate version name, dropping qualifiers and trailing
/// non-numeric parts.
fn parse_lenient(value: &str) -> Option<Components> {
    let core = value.split(['-', ' ', '+']).next()?;
    let mut components = [0u64; 3];
    let mut parsed_any = false;

    for (slot, part) in components.iter_mut().zip(core.split('.')) {
        let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
        if digits.is_empty() {
            break;
        }
        *slot = digits.parse().ok()?;
        parsed_any = true;
    }

    parsed_any.then_some(components)
}

/// Evaluates an audience version predicate against the device.
pub(crate) fn predicate_matches(predicate: &VersionPredicate, device: &DeviceState) -> bool {
    match predicate {
        VersionPredicate::VersionCode { at_least, at_most } => {
            let code = device.app_version_code;
            at_least.is_none_or(|min| code >= min) && at_most.is_none_or(|max| code <= max)
        }
        VersionPredicate::VersionMatches(constraint) => match VersionConstraint::parse(constraint) {
            Ok(parsed) => device
                .app_version_name
                .as_deref()
                .is_some_and(|name| parsed.matches(name)),
            Err(e) => {
                warn!("Invalid app version constraint {:?}: {}", constraint, e);
                false
            }
        },
    }
}
