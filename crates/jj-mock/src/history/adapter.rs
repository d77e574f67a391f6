//! Presentation of history bodies.

use super::HistoryItem;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

fn pairs(items: &[(String, String)]) -> Value {
    Value::Array(items.iter().map(|(k, v)| json!([k, v])).collect())
}

fn content_type(headers: &[(String, String)]) -> Option<&str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.as_str())
}

/// Turns a stored item into plain JSON. Stored bytes are never modified.
pub trait HistoryAdapter: Send + Sync {
    /// Decode a raw body for display.
    fn adapt_body(&self, headers: &[(String, String)], body: &[u8]) -> Value;

    fn adapt(&self, item: &HistoryItem) -> Value {
        let request = &item.request;
        let response = &item.response;
        json!({
            "request": {
                "method": request.method,
                "path": request.path,
                "segments": request.segments,
                "params": pairs(&request.params),
                "headers": pairs(&request.headers),
                "body": self.adapt_body(&request.headers, &request.body),
            },
            "response": {
                "status": response.status,
                "reason": response.reason,
                "headers": pairs(&response.headers),
                "body": self.adapt_body(&response.headers, &response.body),
            },
            "tags": item.tags,
            "created_at": item.created_at.to_rfc3339(),
        })
    }
}

/// JSON bodies become JSON values, text and form bodies become strings,
/// anything else is base64.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentTypeAdapter;

impl HistoryAdapter for ContentTypeAdapter {
    fn adapt_body(&self, headers: &[(String, String)], body: &[u8]) -> Value {
        if body.is_empty() {
            return Value::String(String::new());
        }
        let mime = content_type(headers)
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let is_json = mime == "application/json" || mime.ends_with("+json");
        if is_json {
            if let Ok(value) = serde_json::from_slice::<Value>(body) {
                return value;
            }
        }
        let is_text = is_json
            || mime.starts_with("text/")
            || mime == "application/x-www-form-urlencoded"
            || mime == "application/xml";
        if is_text {
            if let Ok(text) = std::str::from_utf8(body) {
                return Value::String(text.to_string());
            }
        }
        Value::String(BASE64.encode(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryRepository;
    use crate::request::Request;
    use crate::response::Response;

    fn headers(content_type: &str) -> Vec<(String, String)> {
        vec![("Content-Type".to_string(), content_type.to_string())]
    }

    #[test]
    fn test_json_body_decoded() {
        let value = ContentTypeAdapter.adapt_body(
            &headers("application/json; charset=utf-8"),
            br#"{"a":[1]}"#,
        );
        assert_eq!(value, json!({"a": [1]}));
    }

    #[test]
    fn test_invalid_json_falls_back_to_text() {
        let value = ContentTypeAdapter.adapt_body(&headers("application/json"), b"{oops");
        assert_eq!(value, json!("{oops"));
    }

    #[test]
    fn test_text_and_form_bodies() {
        assert_eq!(
            ContentTypeAdapter.adapt_body(&headers("text/plain"), b"hello"),
            json!("hello")
        );
        assert_eq!(
            ContentTypeAdapter
                .adapt_body(&headers("application/x-www-form-urlencoded"), b"a=1&b=2"),
            json!("a=1&b=2")
        );
    }

    #[test]
    fn test_binary_body_base64() {
        assert_eq!(
            ContentTypeAdapter.adapt_body(&headers("application/octet-stream"), &[0xff, 0x00]),
            json!("/wA=")
        );
        assert_eq!(ContentTypeAdapter.adapt_body(&[], b"raw"), json!("cmF3"));
    }

    #[test]
    fn test_adapt_item_keeps_raw_bytes() {
        let repo = HistoryRepository::new();
        let request = Request::new("POST", "/users")
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"a"}"#);
        repo.add(&request, &Response::json(&json!([])), vec!["id".into()]);

        let item = &repo.get_by_tag("id")[0];
        let adapted = ContentTypeAdapter.adapt(item);
        assert_eq!(adapted["request"]["body"], json!({"name": "a"}));
        assert_eq!(adapted["response"]["body"], json!([]));
        assert_eq!(adapted["request"]["headers"], json!([["content-type", "application/json"]]));
        assert_eq!(adapted["tags"], json!(["id"]));
        assert_eq!(item.request.body.as_ref(), br#"{"name":"a"}"#);
    }
}
