//! Request-level matchers and logical combinators.

use super::attribute::AttributeMatcher;
use super::multidict::MultiDictMatcher;
use super::MatcherError;
use crate::request::Request;
use crate::resolver::{Handler, MatchFn, Resolver};
use std::fmt;
use std::sync::Arc;

/// Predicate over a whole request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestMatcher {
    /// Matches `request.method`; `"*"` is always tried as well
    Method(AttributeMatcher),
    /// Matches `request.path`; route templates write captured segments
    Path(AttributeMatcher),
    /// Matches `request.headers`
    Header(MultiDictMatcher),
    /// Matches `request.query`
    Param(MultiDictMatcher),
    /// Short-circuit AND over a non-empty list
    All(Vec<RequestMatcher>),
    /// Short-circuit OR over a non-empty list
    Any(Vec<RequestMatcher>),
    /// In-process predicate; never crosses the wire
    Custom(CustomMatcher),
}

impl RequestMatcher {
    /// Method matcher; the name is upper-cased, `"*"` matches every method.
    pub fn method(name: &str) -> Self {
        Self::Method(AttributeMatcher::Equal(name.to_ascii_uppercase()))
    }

    pub fn method_matching(matcher: AttributeMatcher) -> Self {
        Self::Method(matcher)
    }

    /// Path matcher from a route template (`/users/{id}`).
    pub fn path(template: &str) -> Result<Self, MatcherError> {
        Ok(Self::Path(AttributeMatcher::route(template)?))
    }

    pub fn path_matching(matcher: AttributeMatcher) -> Self {
        Self::Path(matcher)
    }

    pub fn header<K, M>(expected: impl IntoIterator<Item = (K, M)>) -> Self
    where
        K: Into<String>,
        M: Into<AttributeMatcher>,
    {
        Self::Header(MultiDictMatcher::new(expected))
    }

    pub fn param<K, M>(expected: impl IntoIterator<Item = (K, M)>) -> Self
    where
        K: Into<String>,
        M: Into<AttributeMatcher>,
    {
        Self::Param(MultiDictMatcher::new(expected))
    }

    pub fn all(matchers: Vec<RequestMatcher>) -> Result<Self, MatcherError> {
        if matchers.is_empty() {
            return Err(MatcherError::EmptyCombinator("All"));
        }
        Ok(Self::All(matchers))
    }

    pub fn any(matchers: Vec<RequestMatcher>) -> Result<Self, MatcherError> {
        if matchers.is_empty() {
            return Err(MatcherError::EmptyCombinator("Any"));
        }
        Ok(Self::Any(matchers))
    }

    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        Self::Custom(CustomMatcher {
            name: name.into(),
            predicate: Arc::new(predicate),
        })
    }

    /// Evaluate against `request`.
    ///
    /// A successful route match writes the captured segments onto the
    /// request; a failed one clears them.
    pub fn matches(&self, request: &mut Request) -> bool {
        match self {
            Self::Method(sub) => sub.matches("*") || sub.matches(request.method()),
            Self::Path(AttributeMatcher::Route(route)) => match route.segments(request.path()) {
                Some(segments) => {
                    request.set_segments(segments);
                    true
                }
                None => {
                    request.clear_segments();
                    false
                }
            },
            Self::Path(sub) => sub.matches(request.path()),
            Self::Header(sub) => sub.matches(request.headers()),
            Self::Param(sub) => sub.matches(request.query()),
            Self::All(matchers) => matchers.iter().all(|m| m.matches(request)),
            Self::Any(matchers) => matchers.iter().any(|m| m.matches(request)),
            Self::Custom(custom) => (custom.predicate)(request),
        }
    }

    pub fn into_match_fn(self) -> MatchFn {
        Arc::new(move |request: &mut Request| self.matches(request))
    }

    /// Register this matcher for `handler` and return the handler unchanged.
    pub fn attach(self, resolver: &Resolver, handler: Handler) -> Handler {
        resolver.register_matcher(self.into_match_fn(), &handler);
        handler
    }
}

impl fmt::Display for RequestMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, items: &[RequestMatcher]) -> fmt::Result {
            write!(f, "{name}(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::Method(sub) => write!(f, "Method({sub})"),
            Self::Path(sub) => write!(f, "Path({sub})"),
            Self::Header(sub) => write!(f, "Header({sub})"),
            Self::Param(sub) => write!(f, "Param({sub})"),
            Self::All(items) => list(f, "All", items),
            Self::Any(items) => list(f, "Any", items),
            Self::Custom(custom) => write!(f, "Custom({:?})", custom.name),
        }
    }
}

/// Named in-process predicate.
#[derive(Clone)]
pub struct CustomMatcher {
    name: String,
    predicate: Arc<dyn Fn(&Request) -> bool + Send + Sync>,
}

impl CustomMatcher {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for CustomMatcher {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.predicate, &other.predicate)
    }
}

impl fmt::Debug for CustomMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomMatcher").field(&self.name).finish()
    }
}
