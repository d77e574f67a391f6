//! Composable request matchers.
//!
//! Three layers, leaves first:
//!
//! - `AttributeMatcher`: predicates over a single string value (`Equal`,
//!   `NotEqual`, `Contain`, `NotContain`, `Regex`, `Exists`, `Route`)
//! - `MultiDictMatcher`: keyed matching over multi-valued maps (headers, query)
//! - `RequestMatcher`: request-facet wrappers (`Method`, `Path`, `Header`,
//!   `Param`) and the `All`/`Any` combinators
//!
//! Attaching a `RequestMatcher` to a handler is the registration primitive:
//! `matcher.attach(&resolver, handler)` stores the predicate in the resolver
//! and hands the handler back unchanged.

mod attribute;
mod multidict;
mod request;
mod route;

pub use attribute::{AttributeMatcher, RegexMatcher};
pub use multidict::MultiDictMatcher;
pub use request::{CustomMatcher, RequestMatcher};
pub use route::RouteMatcher;

use thiserror::Error;

/// Matcher construction errors. None of these are recoverable at match time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatcherError {
    #[error("{0} requires at least one matcher")]
    EmptyCombinator(&'static str),
    #[error("invalid regex `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("unknown regex flag `{0}`")]
    UnknownRegexFlag(char),
    #[error("invalid route template `{template}`: {reason}")]
    InvalidRoute { template: String, reason: String },
}
