//! Path templates with `{name}` segment capture.

use super::MatcherError;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Compiled route template such as `/users/{id}/posts/{post}`.
///
/// Each `{name}` captures exactly one non-empty path component. The whole
/// path must match; trailing components are rejected.
#[derive(Clone)]
pub struct RouteMatcher {
    template: String,
    regex: Arc<Regex>,
    names: Vec<String>,
}

impl RouteMatcher {
    pub fn new(template: impl Into<String>) -> Result<Self, MatcherError> {
        let template = template.into();
        let invalid = |reason: &str| MatcherError::InvalidRoute {
            template: template.clone(),
            reason: reason.to_string(),
        };

        let mut pattern = String::from("^");
        let mut names: Vec<String> = Vec::new();
        let mut rest = template.as_str();

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            if literal.contains('}') {
                return Err(invalid("unbalanced `}`"));
            }
            pattern.push_str(&regex::escape(literal));

            let close = tail.find('}').ok_or_else(|| invalid("unclosed `{`"))?;
            let name = &tail[1..close];
            if !is_identifier(name) {
                return Err(invalid(&format!("bad segment name `{name}`")));
            }
            if names.iter().any(|n| n == name) {
                return Err(invalid(&format!("duplicate segment `{name}`")));
            }
            pattern.push_str(&format!("(?P<{name}>[^/]+)"));
            names.push(name.to_string());
            rest = &tail[close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid("unbalanced `}`"));
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            template,
            regex: Arc::new(regex),
            names,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Captured `{name: value}` pairs, or `None` when the path does not match.
    pub fn segments(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl PartialEq for RouteMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
    }
}

impl fmt::Debug for RouteMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RouteMatcher").field(&self.template).finish()
    }
}
