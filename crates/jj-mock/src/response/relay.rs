//! Responses forwarded from an upstream server.

use super::{DispatchError, Response};
use crate::request::Request;
use futures::StreamExt;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Fallback client for templates created without an injected one.
static DEFAULT_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn default_client() -> reqwest::Client {
    DEFAULT_CLIENT.get_or_init(reqwest::Client::new).clone()
}

/// Outbound client used by relay and tunnel responses.
pub fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
}

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_forwardable(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    !HOP_BY_HOP.contains(&name.as_str()) && name != "host" && name != "content-length"
}

fn upstream_url(target: &str, request: &Request) -> String {
    let path: Vec<_> = request.path().split('/').map(urlencoding::encode).collect();
    let mut url = format!("{}{}", target.trim_end_matches('/'), path.join("/"));
    if !request.query().is_empty() {
        let query: Vec<String> = request
            .query()
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}

async fn send(
    client: &reqwest::Client,
    target: &str,
    request: &Request,
) -> Result<reqwest::Response, DispatchError> {
    let method = reqwest::Method::from_bytes(request.method().as_bytes())
        .map_err(|e| DispatchError::InvalidResponse(format!("unsupported method: {e}")))?;
    let url = upstream_url(target, request);
    debug!(method = %method, url = %url, "Forwarding request upstream");

    let mut outbound = client.request(method, &url);
    for (name, value) in request.headers().iter().filter(|(k, _)| is_forwardable(k)) {
        outbound = outbound.header(name, value);
    }
    Ok(outbound.body(request.body().clone()).send().await?)
}

fn copy_head(upstream: &reqwest::Response) -> Response {
    let mut response = Response::new(upstream.status().as_u16());
    for (name, value) in upstream.headers() {
        if !is_forwardable(name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            response = response.with_header(name.as_str(), value);
        }
    }
    response
}

/// Forward the request to `target` and buffer the upstream response.
#[derive(Clone)]
pub struct RelayResponse {
    target: String,
    client: Option<reqwest::Client>,
}

impl RelayResponse {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            client: None,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub(crate) fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn prepare(&self, request: &Request) -> Result<Response, DispatchError> {
        let client = self.client.clone().unwrap_or_else(default_client);
        let upstream = send(&client, &self.target, request).await?;
        let response = copy_head(&upstream);
        Ok(response.with_body(upstream.bytes().await?))
    }
}

/// Forward the request to `target` and stream the upstream body back.
#[derive(Clone)]
pub struct TunnelResponse {
    target: String,
    client: Option<reqwest::Client>,
}

impl TunnelResponse {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            client: None,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub(crate) fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn prepare(&self, request: &Request) -> Result<Response, DispatchError> {
        let client = self.client.clone().unwrap_or_else(default_client);
        let upstream = send(&client, &self.target, request).await?;
        let response = copy_head(&upstream);
        let stream = upstream
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(response.with_stream(Box::pin(stream)))
    }
}

macro_rules! forward_impls {
    ($ty:ident) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.target == other.target
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("target", &self.target)
                    .finish()
            }
        }
    };
}

forward_impls!(RelayResponse);
forward_impls!(TunnelResponse);
