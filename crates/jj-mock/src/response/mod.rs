//! Responses produced by handlers and the templates mocks are configured with.
//!
//! A [`ResponseTemplate`] is what a mock stores; every served request works
//! on its own clone and calls [`ResponseTemplate::prepare`] to turn it into a
//! concrete [`Response`]. Delays, relays and placeholder rendering all happen
//! inside `prepare`.

mod relay;
mod render;
mod template;

pub use relay::{build_client, RelayResponse, TunnelResponse};
pub use render::render;
pub use template::{DelayedResponse, ResponseTemplate, StaticResponse, TemplateResponse};

use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

/// Chunked body, used by tunnel responses.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Failures while producing a response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler `{0}` needs an app instance but none was bound")]
    UnboundHandler(String),

    #[error("handler `{handler}` cannot be bound to app `{app}`")]
    AppMismatch { handler: String, app: String },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub enum ResponseBody {
    Full(Bytes),
    Stream(BodyStream),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A concrete response, ready for the transport.
#[derive(Debug)]
pub struct Response {
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: ResponseBody::Full(Bytes::new()),
        }
    }

    /// 200 with a `text/plain` body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    /// 200 with an `application/json` body.
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
        self.body = ResponseBody::Full(body.into());
        self
    }

    pub fn with_stream(mut self, stream: BodyStream) -> Self {
        self.body = ResponseBody::Stream(stream);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Explicit reason phrase, else the canonical one for the status.
    pub fn reason(&self) -> &str {
        match &self.reason {
            Some(reason) => reason,
            None => canonical_reason(self.status),
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value for `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Buffered body; `None` for streams.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            ResponseBody::Full(bytes) => Some(bytes),
            ResponseBody::Stream(_) => None,
        }
    }

    /// Explicit reason phrase only.
    pub fn custom_reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn into_parts(self) -> (u16, Option<String>, Vec<(String, String)>, ResponseBody) {
        (self.status, self.reason, self.headers, self.body)
    }
}

pub fn canonical_reason(status: u16) -> &'static str {
    hyper::StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}
