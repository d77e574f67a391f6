use super::{RemoteError, RemoteHandler};
use crate::matcher::RequestMatcher;
use crate::mock::CONTROL_PREFIX;
use crate::request::REMOTE_MOCK_HEADER;
use crate::response::ResponseTemplate;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

/// Connection to a running mock server's control plane.
#[derive(Debug, Clone)]
pub struct RemoteMock {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteMock {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// New, unregistered handler with a fresh id.
    pub fn create_handler(
        &self,
        matcher: RequestMatcher,
        response: impl Into<ResponseTemplate>,
    ) -> RemoteHandler {
        RemoteHandler::new(self.clone(), matcher, response.into())
    }

    /// Remove every registered handler and clear history.
    pub async fn reset(&self) -> Result<(), RemoteError> {
        self.call(Method::POST, "/reset", &Value::Object(Default::default()))
            .await
            .map(drop)
    }

    /// Send a control request and return its JSON body.
    ///
    /// Non-2xx answers become [`RemoteError::Server`] with the server's
    /// `error` field as the message.
    pub(super) async fn call(
        &self,
        method: Method,
        route: &str,
        body: &Value,
    ) -> Result<Value, RemoteError> {
        let url = format!("{}{}{}", self.base_url, CONTROL_PREFIX, route);
        debug!("{} {}", method, url);
        let response = self
            .client
            .request(method, &url)
            .header(REMOTE_MOCK_HEADER, "1")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .map(|error| match error {
                    Value::String(message) => message,
                    other => other.to_string(),
                })
                .unwrap_or(text);
            return Err(RemoteError::Server {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&text).map_err(|e| RemoteError::Parse(e.to_string()))
    }
}
