//! Response templates stored on mock handlers.

use super::relay::{RelayResponse, TunnelResponse};
use super::render::render;
use super::{DispatchError, Response};
use crate::request::Request;
use bytes::Bytes;
use std::time::Duration;

/// Fixed status, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticResponse {
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Default for StaticResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl StaticResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200)
            .with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn to_response(&self) -> Response {
        let mut response = Response::new(self.status).with_body(self.body.clone());
        if let Some(reason) = &self.reason {
            response = response.with_reason(reason.clone());
        }
        for (name, value) in &self.headers {
            response = response.with_header(name.clone(), value.clone());
        }
        response
    }
}

/// A static response sent after a pause.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedResponse {
    delay: Duration,
    response: StaticResponse,
}

impl DelayedResponse {
    pub fn new(delay: Duration, response: StaticResponse) -> Self {
        Self { delay, response }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn response(&self) -> &StaticResponse {
        &self.response
    }
}

/// Status, headers and body rendered from the request at send time.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateResponse {
    status: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl TemplateResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: "200".to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    fn render(&self, request: &Request) -> Result<Response, DispatchError> {
        let rendered = render(&self.status, request);
        let status = rendered
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|code| (100..=999).contains(code))
            .ok_or_else(|| {
                DispatchError::InvalidResponse(format!("status `{rendered}` is not a valid code"))
            })?;

        let mut response = Response::new(status).with_body(render(&self.body, request));
        for (name, value) in &self.headers {
            response = response.with_header(name.clone(), render(value, request));
        }
        Ok(response)
    }
}

/// Any response a mock can be configured with.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseTemplate {
    Static(StaticResponse),
    Delayed(DelayedResponse),
    Relay(RelayResponse),
    Tunnel(TunnelResponse),
    Template(TemplateResponse),
}

impl ResponseTemplate {
    /// Produce the response for `request`.
    ///
    /// Runs on a per-request clone, so concurrent requests never share
    /// in-flight state.
    pub async fn prepare(self, request: &Request) -> Result<Response, DispatchError> {
        match self {
            ResponseTemplate::Static(response) => Ok(response.to_response()),
            ResponseTemplate::Delayed(delayed) => {
                tokio::time::sleep(delayed.delay).await;
                Ok(delayed.response.to_response())
            }
            ResponseTemplate::Relay(relay) => relay.prepare(request).await,
            ResponseTemplate::Tunnel(tunnel) => tunnel.prepare(request).await,
            ResponseTemplate::Template(template) => template.render(request),
        }
    }

    /// Short type name, as used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseTemplate::Static(_) => "Response",
            ResponseTemplate::Delayed(_) => "DelayedResponse",
            ResponseTemplate::Relay(_) => "RelayResponse",
            ResponseTemplate::Tunnel(_) => "TunnelResponse",
            ResponseTemplate::Template(_) => "TemplateResponse",
        }
    }
}

impl From<StaticResponse> for ResponseTemplate {
    fn from(response: StaticResponse) -> Self {
        ResponseTemplate::Static(response)
    }
}

impl From<DelayedResponse> for ResponseTemplate {
    fn from(response: DelayedResponse) -> Self {
        ResponseTemplate::Delayed(response)
    }
}

impl From<RelayResponse> for ResponseTemplate {
    fn from(response: RelayResponse) -> Self {
        ResponseTemplate::Relay(response)
    }
}

impl From<TunnelResponse> for ResponseTemplate {
    fn from(response: TunnelResponse) -> Self {
        ResponseTemplate::Tunnel(response)
    }
}

impl From<TemplateResponse> for ResponseTemplate {
    fn from(response: TemplateResponse) -> Self {
        ResponseTemplate::Template(response)
    }
}
