//! `${request.*}` placeholder substitution.
//!
//! Supported placeholders:
//!
//! - `${request.method}`, `${request.path}`, `${request.body}`
//! - `${request.query.<name>}` - first query value
//! - `${request.headers.<name>}` - first header value (case-insensitive)
//! - `${request.segments.<name>}` - route segment captured by the winning match
//!
//! Unknown placeholders render as the empty string.

use crate::request::Request;
use regex::Regex;
use std::sync::OnceLock;

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"\$\{request\.([a-zA-Z_]+)(?:\.([a-zA-Z0-9_-]+))?\}")
            .expect("placeholder pattern is valid")
    })
}

fn lookup(request: &Request, field: &str, name: Option<&str>) -> Option<String> {
    match (field, name) {
        ("method", None) => Some(request.method().to_string()),
        ("path", None) => Some(request.path().to_string()),
        ("body", None) => Some(String::from_utf8_lossy(request.body()).into_owned()),
        ("query", Some(name)) => request.query().get(name).map(str::to_string),
        ("headers", Some(name)) => request.headers().get(name).map(str::to_string),
        ("segments", Some(name)) => request.segments().get(name).cloned(),
        _ => None,
    }
}

/// Substitute every placeholder in `template` with data from `request`.
pub fn render(template: &str, request: &Request) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &regex::Captures| {
            let name = caps.get(2).map(|m| m.as_str());
            lookup(request, &caps[1], name).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request() -> Request {
        let mut request = Request::new("POST", "/users/123")
            .with_param("name", "John")
            .with_header("X-Request-Id", "req-12345")
            .with_body(r#"{"action": "test"}"#);
        request.set_segments(HashMap::from([("id".to_string(), "123".to_string())]));
        request
    }

    #[test]
    fn test_render_request_fields() {
        let rendered = render(
            "${request.method} ${request.path} ${request.query.name} ${request.headers.x-request-id} ${request.segments.id}",
            &request(),
        );
        assert_eq!(rendered, "POST /users/123 John req-12345 123");
    }

    #[test]
    fn test_render_body() {
        assert_eq!(
            render(r#"{"echo": ${request.body}}"#, &request()),
            r#"{"echo": {"action": "test"}}"#
        );
    }

    #[test]
    fn test_unknown_placeholders_render_empty() {
        assert_eq!(
            render("[${request.query.missing}][${request.cookies.a}]", &request()),
            "[][]"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(render("no placeholders $ {here}", &request()), "no placeholders $ {here}");
    }
}
