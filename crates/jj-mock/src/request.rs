//! Inbound request model shared by matchers, handlers and history.

use bytes::Bytes;
use std::collections::HashMap;

/// Header carried by control-plane traffic.
pub const REMOTE_MOCK_HEADER: &str = "x-jj-remote-mock";

/// Ordered multi-valued map used for headers and query parameters.
///
/// Keys keep their original spelling. Header maps compare keys
/// case-insensitively; query maps compare them exactly. Values are always
/// compared exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiDict {
    items: Vec<(String, String)>,
    case_insensitive: bool,
}

impl MultiDict {
    /// Map with exact key comparison (query parameters).
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with case-insensitive key comparison (headers).
    pub fn case_insensitive() -> Self {
        Self {
            items: Vec::new(),
            case_insensitive: true,
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut dict = Self::new();
        dict.extend(pairs);
        dict
    }

    pub fn headers_from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut dict = Self::case_insensitive();
        dict.extend(pairs);
        dict
    }

    /// Parse a raw query string, percent-decoding keys and values.
    pub fn parse_query(query: Option<&str>) -> Self {
        let mut dict = Self::new();
        let Some(query) = query else {
            return dict;
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            dict.insert(decode_component(key), decode_component(value));
        }
        dict
    }

    /// Append a value; existing values for the key are kept.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.push((key.into(), value.into()));
    }

    pub fn extend<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.insert(k, v);
        }
    }

    fn key_matches(&self, candidate: &str, key: &str) -> bool {
        if self.case_insensitive {
            candidate.eq_ignore_ascii_case(key)
        } else {
            candidate == key
        }
    }

    /// Every value bound to `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.items
            .iter()
            .filter(move |(k, _)| self.key_matches(k, key))
            .map(|(_, v)| v.as_str())
    }

    /// First value bound to `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| self.key_matches(k, key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// A request as seen by the dispatch engine.
///
/// The body is read from the transport exactly once, before dispatch.
/// `segments` is written by route matchers and reflects only the winning
/// match.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    path: String,
    query: MultiDict,
    headers: MultiDict,
    body: Bytes,
    segments: HashMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            query: MultiDict::new(),
            headers: MultiDict::case_insensitive(),
            body: Bytes::new(),
            segments: HashMap::new(),
        }
    }

    pub fn with_query(mut self, query: MultiDict) -> Self {
        self.query = query;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key, value);
        self
    }

    pub fn with_headers(mut self, headers: MultiDict) -> Self {
        self.headers = MultiDict::headers_from_pairs(headers.items);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &MultiDict {
        &self.query
    }

    pub fn headers(&self) -> &MultiDict {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn segments(&self) -> &HashMap<String, String> {
        &self.segments
    }

    pub fn set_segments(&mut self, segments: HashMap<String, String>) {
        self.segments = segments;
    }

    pub fn clear_segments(&mut self) {
        self.segments.clear();
    }

    /// Whether the request targets the control plane.
    pub fn is_control_plane(&self) -> bool {
        self.headers.contains_key(REMOTE_MOCK_HEADER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_multi_valued() {
        let query = MultiDict::parse_query(Some("key=2&key=1&other=a%20b&flag"));
        let values: Vec<_> = query.get_all("key").collect();
        assert_eq!(values, vec!["2", "1"]);
        assert_eq!(query.get("other"), Some("a b"));
        assert_eq!(query.get("flag"), Some(""));
        assert_eq!(query.get("KEY"), None);
    }

    #[test]
    fn test_get_outlives_key() {
        let query = MultiDict::from_pairs([("page", "2")]);
        let value = {
            let key = String::from("page");
            query.get(&key)
        };
        assert_eq!(value, Some("2"));
    }

    #[test]
    fn test_parse_query_empty() {
        assert!(MultiDict::parse_query(None).is_empty());
        assert!(MultiDict::parse_query(Some("")).is_empty());
    }

    #[test]
    fn test_header_keys_case_insensitive() {
        let request = Request::new("get", "/")
            .with_header("Content-Type", "application/json")
            .with_header("X-Trace", "a");
        assert_eq!(request.method(), "GET");
        assert_eq!(request.headers().get("content-type"), Some("application/json"));
        assert_eq!(request.headers().get("x-trace"), Some("a"));
        // values stay case-sensitive and keys keep their spelling
        assert_eq!(request.headers().iter().next(), Some(("Content-Type", "application/json")));
    }

    #[test]
    fn test_control_plane_detection() {
        let request = Request::new("POST", "/__jj__/register").with_header("X-JJ-Remote-Mock", "");
        assert!(request.is_control_plane());
        assert!(!Request::new("GET", "/").is_control_plane());
    }

    #[test]
    fn test_segments_slot() {
        let mut request = Request::new("GET", "/users/1");
        request.set_segments(HashMap::from([("id".to_string(), "1".to_string())]));
        assert_eq!(request.segments().get("id").map(String::as_str), Some("1"));
        request.clear_segments();
        assert!(request.segments().is_empty());
    }
}
