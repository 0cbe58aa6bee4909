//! Tag constraints used to filter discovered entities
//!
//! A constraint is written `tag==<pattern>` (at least one tag must match) or
//! `tag!=<pattern>` (no tag may match). Every constraint of a set must hold
//! for an entity to be kept.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The only key constraints can currently be expressed against
pub const TAG_KEY: &str = "tag";

/// Errors produced when parsing a constraint from its textual form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintParseError {
    #[error("constraint '{0}' is missing an operator, expected '==' or '!='")]
    MissingOperator(String),

    #[error("unsupported constraint key '{key}', only 'tag' is supported")]
    UnsupportedKey { key: String },
}

/// A single tag constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Constraint key, always [`TAG_KEY`]
    pub key: String,
    /// Pattern compared against each tag
    pub value: String,
    /// `true` for `==`, `false` for `!=`
    pub must_match: bool,
}

impl Constraint {
    /// Constraint satisfied by entities carrying a tag matching `pattern`
    pub fn must_match(pattern: impl Into<String>) -> Self {
        Self {
            key: TAG_KEY.to_string(),
            value: pattern.into(),
            must_match: true,
        }
    }

    /// Constraint satisfied by entities carrying no tag matching `pattern`
    pub fn must_not_match(pattern: impl Into<String>) -> Self {
        Self {
            key: TAG_KEY.to_string(),
            value: pattern.into(),
            must_match: false,
        }
    }

    /// Whether at least one of `tags` matches this constraint's pattern
    pub fn matches_at_least_one_tag(&self, tags: &[String], matcher: &dyn TagMatcher) -> bool {
        tags.iter().any(|tag| matcher.matches(&self.value, tag))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.must_match { "==" } else { "!=" };
        write!(f, "{}{}{}", self.key, op, self.value)
    }
}

impl FromStr for Constraint {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The operator is the earliest of `==` and `!=`; the pattern may
        // contain either.
        let (at, must_match) = match (s.find("=="), s.find("!=")) {
            (Some(eq), Some(ne)) if ne < eq => (ne, false),
            (Some(eq), _) => (eq, true),
            (None, Some(ne)) => (ne, false),
            (None, None) => return Err(ConstraintParseError::MissingOperator(s.to_string())),
        };
        let (key, value) = (&s[..at], &s[at + 2..]);

        let key = key.trim();
        if key != TAG_KEY {
            return Err(ConstraintParseError::UnsupportedKey {
                key: key.to_string(),
            });
        }

        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
            must_match,
        })
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Comparison rule between a constraint pattern and a tag
pub trait TagMatcher {
    fn matches(&self, pattern: &str, tag: &str) -> bool;
}

/// Plain string equality
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl TagMatcher for ExactMatcher {
    fn matches(&self, pattern: &str, tag: &str) -> bool {
        pattern == tag
    }
}

/// Glob matching where `*` stands for any run of characters, including none.
///
/// A pattern without `*` only matches an identical tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobMatcher;

impl TagMatcher for GlobMatcher {
    fn matches(&self, pattern: &str, tag: &str) -> bool {
        glob_match(pattern, tag)
    }
}

fn glob_match(pattern: &str, subject: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == subject;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !subject.starts_with(first) {
        return false;
    }

    // Middle fragments must appear in order after the prefix
    let mut rest = &subject[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// Check `tags` against every constraint using the default [`GlobMatcher`].
///
/// Returns the first constraint that does not hold, if any. Filtering is
/// disabled when there are neither tags nor constraints.
///
/// ```rust
/// use config_synth::{match_constraints, Constraint};
///
/// let constraints = vec![Constraint::must_match("api*")];
/// let tags = vec!["api-public".to_string()];
/// assert_eq!(match_constraints(&tags, &constraints), (true, None));
/// ```
pub fn match_constraints<'c>(
    tags: &[String],
    constraints: &'c [Constraint],
) -> (bool, Option<&'c Constraint>) {
    match_constraints_with(tags, constraints, &GlobMatcher)
}

/// Check `tags` against every constraint with a caller-chosen match rule
pub fn match_constraints_with<'c>(
    tags: &[String],
    constraints: &'c [Constraint],
    matcher: &dyn TagMatcher,
) -> (bool, Option<&'c Constraint>) {
    if tags.is_empty() && constraints.is_empty() {
        return (true, None);
    }

    for constraint in constraints {
        if constraint.matches_at_least_one_tag(tags, matcher) != constraint.must_match {
            return (false, Some(constraint));
        }
    }

    (true, None)
}
