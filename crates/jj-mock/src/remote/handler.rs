use super::{RemoteError, RemoteMock};
use crate::expiration::ExpirationPolicy;
use crate::history::HistoryItem;
use crate::matcher::RequestMatcher;
use crate::packing::{Pack, PackTable};
use crate::response::ResponseTemplate;
use reqwest::Method;
use serde_json::{json, Value};
use std::future::Future;
use std::ops::Deref;
use std::thread;
use tracing::warn;
use uuid::Uuid;

/// A mock definition owned by a test: matcher, response and optional policy.
#[derive(Debug, Clone)]
pub struct RemoteHandler {
    mock: RemoteMock,
    id: Uuid,
    matcher: RequestMatcher,
    response: ResponseTemplate,
    policy: Option<ExpirationPolicy>,
}

impl RemoteHandler {
    pub(super) fn new(
        mock: RemoteMock,
        matcher: RequestMatcher,
        response: ResponseTemplate,
    ) -> Self {
        Self {
            mock,
            id: Uuid::new_v4(),
            matcher,
            response,
            policy: None,
        }
    }

    pub fn with_expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn matcher(&self) -> &RequestMatcher {
        &self.matcher
    }

    pub fn response(&self) -> &ResponseTemplate {
        &self.response
    }

    pub fn policy(&self) -> Option<&ExpirationPolicy> {
        self.policy.as_ref()
    }

    fn reference(&self) -> Value {
        json!({ "id": self.id.to_string() })
    }

    fn payload(&self) -> Result<Value, RemoteError> {
        let policy = match &self.policy {
            Some(policy) => policy.pack()?,
            None => Value::Null,
        };
        Ok(json!({
            "id": self.id.to_string(),
            "request": self.matcher.pack()?,
            "response": self.response.pack()?,
            "expiration_policy": policy,
        }))
    }

    /// Install on the server. Registering again replaces the earlier copy.
    pub async fn register(&self) -> Result<(), RemoteError> {
        let payload = self.payload()?;
        self.mock
            .call(Method::POST, "/register", &payload)
            .await
            .map(drop)
    }

    /// Remove from the server and purge its history. Unknown ids are fine.
    pub async fn deregister(&self) -> Result<(), RemoteError> {
        self.mock
            .call(Method::DELETE, "/deregister", &self.reference())
            .await
            .map(drop)
    }

    /// Requests served by this handler, newest first.
    pub async fn fetch_history(&self) -> Result<Vec<HistoryItem>, RemoteError> {
        let packed = self
            .mock
            .call(Method::GET, "/history", &self.reference())
            .await?;
        Ok(PackTable::default().unpack_list(&packed)?)
    }

    pub fn register_blocking(&self) -> Result<(), RemoteError> {
        let detached = self.detached();
        block_on(async move { detached.register().await })
    }

    pub fn deregister_blocking(&self) -> Result<(), RemoteError> {
        let detached = self.detached();
        block_on(async move { detached.deregister().await })
    }

    /// Register now and deregister when the guard drops.
    ///
    /// Both calls block the current thread until a helper thread finishes
    /// them, so an in-process server must run on a different thread.
    pub fn mocked(self) -> Result<Mocked, RemoteError> {
        self.register_blocking()?;
        Ok(Mocked { handler: self })
    }

    /// Copy bound to a fresh client, for use on a throwaway runtime.
    fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.mock = RemoteMock::new(self.mock.base_url());
        copy
    }
}

/// Run `future` to completion on a dedicated runtime on a helper thread.
fn block_on<F, T>(future: F) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>> + Send + 'static,
    T: Send + 'static,
{
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RemoteError::Runtime(e.to_string()))?;
        runtime.block_on(future)
    })
    .join()
    .map_err(|_| RemoteError::Runtime("control thread panicked".to_string()))?
}

/// Scope guard returned by [`RemoteHandler::mocked`].
#[derive(Debug)]
pub struct Mocked {
    handler: RemoteHandler,
}

impl Deref for Mocked {
    type Target = RemoteHandler;

    fn deref(&self) -> &RemoteHandler {
        &self.handler
    }
}

impl Drop for Mocked {
    fn drop(&mut self) {
        if let Err(e) = self.handler.deregister_blocking() {
            warn!("Failed to deregister {}: {}", self.handler.id, e);
        }
    }
}
