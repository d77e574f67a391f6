//! Identity and value types stored by the resolver.

use crate::expiration::ExpirationPolicy;
use crate::matcher::RequestMatcher;
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::{DispatchError, Response, ResponseTemplate};
use futures::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Well-known attribute names.
pub mod attributes {
    pub const MIDDLEWARES: &str = "middlewares";
    pub const HANDLER_ID: &str = "handler_id";
    pub const MATCHER: &str = "matcher";
    pub const RESPONSE: &str = "response";
    pub const EXPIRATION_POLICY: &str = "expiration_policy";
}

/// Opaque app identity. Apps group handlers and carry no other state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(Arc<str>);

impl AppId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The implicit app that owns handlers registered without one.
    pub fn default_app() -> Self {
        Self::new("__default__")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-unique handler identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered app: its identity plus the instance bound handlers receive.
#[derive(Clone)]
pub struct App {
    id: AppId,
    instance: Arc<dyn Any + Send + Sync>,
}

impl App {
    pub fn new<A: Send + Sync + 'static>(id: AppId, instance: Arc<A>) -> Self {
        Self {
            id,
            instance: instance as Arc<dyn Any + Send + Sync>,
        }
    }

    /// App without an instance; bound handlers cannot run under it.
    pub fn detached(id: AppId) -> Self {
        Self::new(id, Arc::new(()))
    }

    pub fn id(&self) -> &AppId {
        &self.id
    }

    pub fn instance<A: Send + Sync + 'static>(&self) -> Option<Arc<A>> {
        Arc::clone(&self.instance).downcast::<A>().ok()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App").field("id", &self.id).finish()
    }
}

pub type HandlerResult = Result<Response, DispatchError>;
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

#[derive(Clone)]
enum HandlerFn {
    Request(Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>),
    Bound(Arc<dyn Fn(App, Request) -> HandlerFuture + Send + Sync>),
}

/// An async function from `Request` to `Response`.
///
/// Handlers either take the request alone or are "bound": they also receive
/// the owning app's instance, which `SelfMiddleware` supplies.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    name: Arc<str>,
    func: HandlerFn,
}

impl Handler {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            id: HandlerId::next(),
            name: Arc::from(name.into()),
            func: HandlerFn::Request(Arc::new(move |request| -> HandlerFuture {
                Box::pin(func(request))
            })),
        }
    }

    pub fn bound<A, F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        A: Send + Sync + 'static,
        F: Fn(Arc<A>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name.into());
        let handler_name = Arc::clone(&name);
        Self {
            id: HandlerId::next(),
            name,
            func: HandlerFn::Bound(Arc::new(move |app: App, request| -> HandlerFuture {
                match app.instance::<A>() {
                    Some(instance) => Box::pin(func(instance, request)),
                    None => {
                        let error = DispatchError::AppMismatch {
                            handler: handler_name.to_string(),
                            app: app.id().to_string(),
                        };
                        Box::pin(async move { Err(error) })
                    }
                }
            })),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count: 2 for bound handlers, 1 otherwise.
    pub fn arity(&self) -> usize {
        match self.func {
            HandlerFn::Request(_) => 1,
            HandlerFn::Bound(_) => 2,
        }
    }

    /// Invoke the handler. Bound handlers require `app`.
    pub fn call(&self, app: Option<&App>, request: Request) -> HandlerFuture {
        match (&self.func, app) {
            (HandlerFn::Request(func), _) => func(request),
            (HandlerFn::Bound(func), Some(app)) => func(app.clone(), request),
            (HandlerFn::Bound(_), None) => {
                let error = DispatchError::UnboundHandler(self.name.to_string());
                Box::pin(async move { Err(error) })
            }
        }
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("arity", &self.arity())
            .finish()
    }
}

/// Owner of a registry namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    Resolver,
    App(AppId),
    Handler(HandlerId),
}

impl From<&AppId> for Owner {
    fn from(app: &AppId) -> Self {
        Owner::App(app.clone())
    }
}

impl From<&Handler> for Owner {
    fn from(handler: &Handler) -> Self {
        Owner::Handler(handler.id())
    }
}

impl From<HandlerId> for Owner {
    fn from(id: HandlerId) -> Self {
        Owner::Handler(id)
    }
}

/// Value stored under a named attribute.
#[derive(Clone)]
pub enum Attribute {
    Text(String),
    Matcher(RequestMatcher),
    Response(ResponseTemplate),
    ExpirationPolicy(Option<Arc<ExpirationPolicy>>),
    Middlewares(Vec<Arc<dyn Middleware>>),
}

impl Attribute {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Attribute::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_matcher(&self) -> Option<&RequestMatcher> {
        match self {
            Attribute::Matcher(matcher) => Some(matcher),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseTemplate> {
        match self {
            Attribute::Response(response) => Some(response),
            _ => None,
        }
    }

    pub fn as_expiration_policy(&self) -> Option<&Arc<ExpirationPolicy>> {
        match self {
            Attribute::ExpirationPolicy(policy) => policy.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Attribute::Matcher(matcher) => f.debug_tuple("Matcher").field(matcher).finish(),
            Attribute::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Attribute::ExpirationPolicy(policy) => {
                f.debug_tuple("ExpirationPolicy").field(policy).finish()
            }
            Attribute::Middlewares(chain) => {
                let names: Vec<&str> = chain.iter().map(|m| m.name()).collect();
                f.debug_tuple("Middlewares").field(&names).finish()
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolverError {
    #[error("attribute `{name}` is not set on {owner:?}")]
    MissingAttribute { name: String, owner: Owner },
}
