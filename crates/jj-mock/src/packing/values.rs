//! Packing for responses, expiration policies and history snapshots.

use super::{
    body_field, encode_body, field, invalid, opt_str_field, pairs_field, pairs_to_value,
    str_field, Fields, Pack, PackError, PackTable, Packed, UnpackContext,
};
use crate::expiration::ExpirationPolicy;
use crate::history::{HistoryItem, HistoryRequest, HistoryResponse};
use crate::response::{
    DelayedResponse, RelayResponse, ResponseTemplate, StaticResponse, TemplateResponse,
    TunnelResponse,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Duration;

fn static_fields(response: &StaticResponse) -> Fields {
    let mut fields = Fields::new();
    fields.insert("status".into(), json!(response.status()));
    fields.insert("reason".into(), json!(response.reason()));
    fields.insert("headers".into(), pairs_to_value(response.headers()));
    fields.insert("body".into(), encode_body(response.body()));
    fields
}

impl Pack for StaticResponse {
    fn type_name(&self) -> &'static str {
        "Response"
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        Ok(static_fields(self))
    }
}

impl Pack for ResponseTemplate {
    fn type_name(&self) -> &'static str {
        self.kind()
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut fields = Fields::new();
        match self {
            ResponseTemplate::Static(response) => return Ok(static_fields(response)),
            ResponseTemplate::Delayed(delayed) => {
                fields.insert("delay".into(), json!(delayed.delay().as_secs_f64()));
                fields.insert("response".into(), delayed.response().pack()?);
            }
            ResponseTemplate::Relay(relay) => {
                fields.insert("target".into(), json!(relay.target()));
            }
            ResponseTemplate::Tunnel(tunnel) => {
                fields.insert("target".into(), json!(tunnel.target()));
            }
            ResponseTemplate::Template(template) => {
                fields.insert("status".into(), json!(template.status()));
                fields.insert("headers".into(), pairs_to_value(template.headers()));
                fields.insert("body".into(), json!(template.body()));
            }
        }
        Ok(fields)
    }
}

impl Pack for ExpirationPolicy {
    fn type_name(&self) -> &'static str {
        match self {
            ExpirationPolicy::Never => "ExpireNever",
            ExpirationPolicy::AfterRequests(_) => "ExpireAfterRequests",
        }
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut fields = Fields::new();
        if let ExpirationPolicy::AfterRequests(budget) = self {
            fields.insert("max_requests".into(), json!(budget.max()));
        }
        Ok(fields)
    }
}

impl Pack for HistoryRequest {
    fn type_name(&self) -> &'static str {
        "HistoryRequest"
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut fields = Fields::new();
        fields.insert("method".into(), json!(self.method));
        fields.insert("path".into(), json!(self.path));
        fields.insert("segments".into(), json!(self.segments));
        fields.insert("params".into(), pairs_to_value(&self.params));
        fields.insert("headers".into(), pairs_to_value(&self.headers));
        fields.insert("body".into(), encode_body(&self.body));
        Ok(fields)
    }
}

impl Pack for HistoryResponse {
    fn type_name(&self) -> &'static str {
        "HistoryResponse"
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut fields = Fields::new();
        fields.insert("status".into(), json!(self.status));
        fields.insert("reason".into(), json!(self.reason));
        fields.insert("headers".into(), pairs_to_value(&self.headers));
        fields.insert("body".into(), encode_body(&self.body));
        Ok(fields)
    }
}

impl Pack for HistoryItem {
    fn type_name(&self) -> &'static str {
        "HistoryItem"
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut fields = Fields::new();
        fields.insert("request".into(), self.request.pack()?);
        fields.insert("response".into(), self.response.pack()?);
        fields.insert("tags".into(), json!(self.tags));
        fields.insert("created_at".into(), json!(self.created_at.to_rfc3339()));
        Ok(fields)
    }
}

// ===== Constructors =====

fn status_field(fields: &Fields, type_name: &'static str) -> Result<u16, PackError> {
    match fields.get("status") {
        None | Some(Value::Null) => Ok(200),
        Some(value) => value
            .as_u64()
            .and_then(|s| u16::try_from(s).ok())
            .filter(|s| (100..=999).contains(s))
            .ok_or_else(|| invalid(type_name, "status", "expected an HTTP status code")),
    }
}

fn unpack_static(fields: &Fields) -> Result<StaticResponse, PackError> {
    let mut response = StaticResponse::new(status_field(fields, "Response")?)
        .with_body(body_field(fields, "Response", "body")?);
    if let Some(reason) = opt_str_field(fields, "Response", "reason")? {
        response = response.with_reason(reason);
    }
    for (name, value) in pairs_field(fields, "Response", "headers")? {
        response = response.with_header(name, value);
    }
    Ok(response)
}

fn response(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    Ok(Packed::Response(unpack_static(fields)?.into()))
}

fn delayed(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let delay = field(fields, "DelayedResponse", "delay")?
        .as_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            invalid(
                "DelayedResponse",
                "delay",
                "expected a non-negative number of seconds",
            )
        })?;
    let inner = field(fields, "DelayedResponse", "response")?;
    let inner = match table.unpack_as::<ResponseTemplate>(inner)? {
        ResponseTemplate::Static(inner) => inner,
        other => {
            return Err(invalid(
                "DelayedResponse",
                "response",
                format!("expected a Response, got {}", other.kind()),
            ))
        }
    };
    Ok(Packed::Response(DelayedResponse::new(delay, inner).into()))
}

fn relay(fields: &Fields, _: &PackTable, context: &UnpackContext) -> Result<Packed, PackError> {
    let mut relay = RelayResponse::new(str_field(fields, "RelayResponse", "target")?);
    if let Some(client) = &context.client {
        relay = relay.with_client(client.clone());
    }
    Ok(Packed::Response(relay.into()))
}

fn tunnel(fields: &Fields, _: &PackTable, context: &UnpackContext) -> Result<Packed, PackError> {
    let mut tunnel = TunnelResponse::new(str_field(fields, "TunnelResponse", "target")?);
    if let Some(client) = &context.client {
        tunnel = tunnel.with_client(client.clone());
    }
    Ok(Packed::Response(tunnel.into()))
}

fn template(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let mut template = TemplateResponse::new(str_field(fields, "TemplateResponse", "body")?);
    match fields.get("status") {
        None | Some(Value::Null) => {}
        Some(Value::String(status)) => template = template.with_status(status.clone()),
        Some(Value::Number(status)) => template = template.with_status(status.to_string()),
        Some(_) => return Err(invalid("TemplateResponse", "status", "expected a string")),
    }
    for (name, value) in pairs_field(fields, "TemplateResponse", "headers")? {
        template = template.with_header(name, value);
    }
    Ok(Packed::Response(template.into()))
}

fn expire_never(_: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    Ok(Packed::Policy(ExpirationPolicy::never()))
}

fn expire_after_requests(
    fields: &Fields,
    _: &PackTable,
    _: &UnpackContext,
) -> Result<Packed, PackError> {
    let max = field(fields, "ExpireAfterRequests", "max_requests")?
        .as_i64()
        .ok_or_else(|| invalid("ExpireAfterRequests", "max_requests", "expected an integer"))?;
    Ok(Packed::Policy(ExpirationPolicy::after_requests(max)?))
}

fn history_request(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    const NAME: &str = "HistoryRequest";
    let segments = match fields.get("segments") {
        None | Some(Value::Null) => Default::default(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| invalid(NAME, "segments", e.to_string()))?,
    };
    Ok(Packed::HistoryRequest(HistoryRequest {
        method: str_field(fields, NAME, "method")?.to_string(),
        path: str_field(fields, NAME, "path")?.to_string(),
        segments,
        params: pairs_field(fields, NAME, "params")?,
        headers: pairs_field(fields, NAME, "headers")?,
        body: body_field(fields, NAME, "body")?,
    }))
}

fn history_response(
    fields: &Fields,
    _: &PackTable,
    _: &UnpackContext,
) -> Result<Packed, PackError> {
    const NAME: &str = "HistoryResponse";
    Ok(Packed::HistoryResponse(HistoryResponse {
        status: status_field(fields, NAME)?,
        reason: opt_str_field(fields, NAME, "reason")?
            .unwrap_or_default()
            .to_string(),
        headers: pairs_field(fields, NAME, "headers")?,
        body: body_field(fields, NAME, "body")?,
    }))
}

fn history_item(
    fields: &Fields,
    table: &PackTable,
    _: &UnpackContext,
) -> Result<Packed, PackError> {
    const NAME: &str = "HistoryItem";
    let tags = match fields.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| invalid(NAME, "tags", e.to_string()))?,
    };
    let created_at = match opt_str_field(fields, NAME, "created_at")? {
        None => Utc::now(),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| invalid(NAME, "created_at", e.to_string()))?,
    };
    Ok(Packed::HistoryItem(HistoryItem {
        request: table.unpack_as(field(fields, NAME, "request")?)?,
        response: table.unpack_as(field(fields, NAME, "response")?)?,
        tags,
        created_at,
    }))
}

pub(super) fn register(table: &mut PackTable) {
    table.register("Response", response);
    table.register("DelayedResponse", delayed);
    table.register("RelayResponse", relay);
    table.register("TunnelResponse", tunnel);
    table.register("TemplateResponse", template);
    table.register("ExpireNever", expire_never);
    table.register("ExpireAfterRequests", expire_after_requests);
    table.register("HistoryRequest", history_request);
    table.register("HistoryResponse", history_response);
    table.register("HistoryItem", history_item);
}
