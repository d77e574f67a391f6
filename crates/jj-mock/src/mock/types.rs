//! Control-plane payloads and JSON response helpers.

use crate::expiration::ExpirationPolicy;
use crate::matcher::RequestMatcher;
use crate::packing::PackTable;
use crate::request::Request;
use crate::response::{Response, ResponseTemplate};
use serde_json::{json, Map, Value};

/// Create a JSON response
pub fn json_response(status: u16, body: &Value) -> Response {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    Response::new(status)
        .with_header("content-type", "application/json")
        .with_body(json)
}

/// `{"status": <code>, "error": <message or list>}`
pub fn error_response(status: u16, error: impl Into<Value>) -> Response {
    json_response(status, &json!({ "status": status, "error": error.into() }))
}

/// `{"status": 200, ...extra}`
pub fn ok_response(extra: Value) -> Response {
    let mut body = Map::new();
    body.insert("status".into(), json!(200));
    if let Value::Object(extra) = extra {
        body.extend(extra);
    }
    json_response(200, &Value::Object(body))
}

/// JSON object body of a control request. An empty body is an empty object.
fn body_object(request: &Request) -> Result<Map<String, Value>, String> {
    if request.body().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(request.body()) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err("body: expected a JSON object".to_string()),
        Err(e) => Err(format!("body: invalid JSON: {e}")),
    }
}

fn parse_id(object: &Map<String, Value>, request: &Request) -> Result<String, String> {
    match object.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::String(_)) => Err("id: must not be empty".to_string()),
        Some(_) => Err("id: expected a string".to_string()),
        None => request
            .query()
            .get("id")
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "id: missing field".to_string()),
    }
}

/// Payload of `POST /__jj__/register`.
#[derive(Debug)]
pub struct RegisterPayload {
    pub id: String,
    pub matcher: RequestMatcher,
    pub response: ResponseTemplate,
    pub expiration_policy: Option<ExpirationPolicy>,
}

impl RegisterPayload {
    /// Decode every field independently; all failures are reported together.
    pub fn parse(request: &Request, table: &PackTable) -> Result<Self, Vec<String>> {
        let object = body_object(request).map_err(|e| vec![e])?;
        let mut errors = Vec::new();

        let id = parse_id(&object, request).map_err(|e| errors.push(e)).ok();

        let matcher = match object.get("request") {
            None | Some(Value::Null) => {
                errors.push("request: missing field".to_string());
                None
            }
            Some(value) => table
                .unpack_as::<RequestMatcher>(value)
                .map_err(|e| errors.push(format!("request: {e}")))
                .ok(),
        };

        let response = match object.get("response") {
            None | Some(Value::Null) => {
                errors.push("response: missing field".to_string());
                None
            }
            Some(value) => table
                .unpack_as::<ResponseTemplate>(value)
                .map_err(|e| errors.push(format!("response: {e}")))
                .ok(),
        };

        let expiration_policy = match object.get("expiration_policy") {
            None | Some(Value::Null) => Some(None),
            Some(value) => table
                .unpack_as::<ExpirationPolicy>(value)
                .map(Some)
                .map_err(|e| errors.push(format!("expiration_policy: {e}")))
                .ok(),
        };

        match (id, matcher, response, expiration_policy) {
            (Some(id), Some(matcher), Some(response), Some(expiration_policy))
                if errors.is_empty() =>
            {
                Ok(Self {
                    id,
                    matcher,
                    response,
                    expiration_policy,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Payload of `DELETE /__jj__/deregister` and `GET /__jj__/history`.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerRef {
    pub id: String,
}

impl HandlerRef {
    pub fn parse(request: &Request) -> Result<Self, Vec<String>> {
        let object = body_object(request).map_err(|e| vec![e])?;
        parse_id(&object, request)
            .map(|id| Self { id })
            .map_err(|e| vec![e])
    }
}
