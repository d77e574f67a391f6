//! Attribute-level matchers over a single string value.

use super::route::RouteMatcher;
use super::MatcherError;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::Arc;

/// Predicate over one attribute value (a method, a path, a header value...).
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeMatcher {
    /// `expected == actual`
    Equal(String),
    /// `expected != actual`
    NotEqual(String),
    /// `expected` is a substring of `actual`
    Contain(String),
    /// `expected` is not a substring of `actual`
    NotContain(String),
    /// Unanchored regex search
    Regex(RegexMatcher),
    /// Always true; inside a multi-dict it only requires the key to be present
    Exists,
    /// Path template with `{name}` captures
    Route(RouteMatcher),
}

impl AttributeMatcher {
    pub fn equal(expected: impl Into<String>) -> Self {
        Self::Equal(expected.into())
    }

    pub fn not_equal(expected: impl Into<String>) -> Self {
        Self::NotEqual(expected.into())
    }

    pub fn contain(expected: impl Into<String>) -> Self {
        Self::Contain(expected.into())
    }

    pub fn not_contain(expected: impl Into<String>) -> Self {
        Self::NotContain(expected.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, MatcherError> {
        Ok(Self::Regex(RegexMatcher::new(pattern, "")?))
    }

    pub fn regex_with_flags(pattern: &str, flags: &str) -> Result<Self, MatcherError> {
        Ok(Self::Regex(RegexMatcher::new(pattern, flags)?))
    }

    pub fn route(template: &str) -> Result<Self, MatcherError> {
        Ok(Self::Route(RouteMatcher::new(template)?))
    }

    pub fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Equal(expected) => expected == actual,
            Self::NotEqual(expected) => expected != actual,
            Self::Contain(expected) => actual.contains(expected.as_str()),
            Self::NotContain(expected) => !actual.contains(expected.as_str()),
            Self::Regex(regex) => regex.is_match(actual),
            Self::Exists => true,
            Self::Route(route) => route.matches(actual),
        }
    }
}

impl From<&str> for AttributeMatcher {
    fn from(value: &str) -> Self {
        Self::Equal(value.to_string())
    }
}

impl From<String> for AttributeMatcher {
    fn from(value: String) -> Self {
        Self::Equal(value)
    }
}

impl From<RouteMatcher> for AttributeMatcher {
    fn from(route: RouteMatcher) -> Self {
        Self::Route(route)
    }
}

impl fmt::Display for AttributeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal(v) => write!(f, "Equal({v:?})"),
            Self::NotEqual(v) => write!(f, "NotEqual({v:?})"),
            Self::Contain(v) => write!(f, "Contain({v:?})"),
            Self::NotContain(v) => write!(f, "NotContain({v:?})"),
            Self::Regex(r) if r.flags.is_empty() => write!(f, "Regex({:?})", r.pattern),
            Self::Regex(r) => write!(f, "Regex({:?}, {:?})", r.pattern, r.flags),
            Self::Exists => f.write_str("Exists"),
            Self::Route(r) => write!(f, "Route({:?})", r.template()),
        }
    }
}

/// Compiled regex together with the source it was built from.
///
/// Flags use the usual single-letter spelling: `i` (case-insensitive),
/// `m` (multi-line), `s` (dot matches newline), `x` (ignore whitespace).
#[derive(Clone)]
pub struct RegexMatcher {
    pattern: String,
    flags: String,
    regex: Arc<Regex>,
}

impl RegexMatcher {
    pub fn new(pattern: &str, flags: &str) -> Result<Self, MatcherError> {
        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => return Err(MatcherError::UnknownRegexFlag(other)),
            };
        }
        let regex = builder.build().map_err(|e| MatcherError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
            regex: Arc::new(regex),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for RegexMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.flags == other.flags
    }
}

impl fmt::Debug for RegexMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexMatcher")
            .field("pattern", &self.pattern)
            .field("flags", &self.flags)
            .finish()
    }
}
