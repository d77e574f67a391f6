//! Keyed matching over multi-valued maps.

use super::attribute::AttributeMatcher;
use crate::request::MultiDict;
use std::fmt;

/// Subset matcher over a `MultiDict`.
///
/// Every expected key must have at least one actual value satisfying its
/// submatcher. Keys that are not expected are ignored. Key comparison follows
/// the actual map (case-insensitive for headers).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiDictMatcher {
    expected: Vec<(String, AttributeMatcher)>,
}

impl MultiDictMatcher {
    pub fn new<K, M>(expected: impl IntoIterator<Item = (K, M)>) -> Self
    where
        K: Into<String>,
        M: Into<AttributeMatcher>,
    {
        let mut matcher = Self::default();
        for (key, sub) in expected {
            matcher.insert(key, sub);
        }
        matcher
    }

    /// Add or replace the submatcher for `key`.
    pub fn insert(&mut self, key: impl Into<String>, sub: impl Into<AttributeMatcher>) {
        let key = key.into();
        let sub = sub.into();
        match self.expected.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = sub,
            None => self.expected.push((key, sub)),
        }
    }

    pub fn expected(&self) -> &[(String, AttributeMatcher)] {
        &self.expected
    }

    pub fn matches(&self, actual: &MultiDict) -> bool {
        self.expected
            .iter()
            .all(|(key, sub)| actual.get_all(key).any(|value| sub.matches(value)))
    }
}

impl fmt::Display for MultiDictMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, sub)) in self.expected.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key:?}: {sub}")?;
        }
        f.write_str("}")
    }
}
