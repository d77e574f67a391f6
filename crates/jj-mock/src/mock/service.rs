use super::types::error_response;
use crate::expiration::ExpirationPolicy;
use crate::history::{ContentTypeAdapter, HistoryAdapter, HistoryRepository};
use crate::matcher::{AttributeMatcher, MatcherError, RequestMatcher};
use crate::metrics;
use crate::middleware::{build_chain, Next};
use crate::packing::{PackTable, UnpackContext};
use crate::request::{Request, REMOTE_MOCK_HEADER};
use crate::resolver::{
    attributes, App, AppBuilder, Attribute, Handler, HandlerResult, MatchFn, Resolver,
};
use crate::response::{Response, ResponseTemplate};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Prefix of every control-plane route.
pub const CONTROL_PREFIX: &str = "/__jj__";

/// Name of the app the control plane is registered under.
pub const MOCK_APP: &str = "jj-mock";

/// Resolver fallback: plain 404.
pub fn not_found_handler() -> Handler {
    Handler::new("not_found", |_| async {
        Ok(Response::new(404)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body("Not Found"))
    })
}

/// The remote-mock control plane.
///
/// Remote handlers live in the resolver's default app; the control routes
/// and the catch-all that serves them live in the [`MOCK_APP`] app.
pub struct MockService {
    pub(super) resolver: Arc<Resolver>,
    pub(super) history: HistoryRepository,
    pub(super) table: PackTable,
    pub(super) adapter: Box<dyn HistoryAdapter>,
}

impl MockService {
    pub fn new(
        resolver: Arc<Resolver>,
        history: HistoryRepository,
        context: UnpackContext,
    ) -> Self {
        Self {
            resolver,
            history,
            table: PackTable::standard(context),
            adapter: Box::new(ContentTypeAdapter),
        }
    }

    pub fn with_adapter(mut self, adapter: Box<dyn HistoryAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn history(&self) -> &HistoryRepository {
        &self.history
    }

    /// Register the control plane and return its app.
    ///
    /// The catch-all goes first so every control route outranks it under a
    /// last-registered-wins resolver.
    pub fn install(self: Arc<Self>) -> Result<App, MatcherError> {
        let control = |method: &str, path: &str| -> Result<RequestMatcher, MatcherError> {
            RequestMatcher::all(vec![
                RequestMatcher::header([(REMOTE_MOCK_HEADER, AttributeMatcher::Exists)]),
                RequestMatcher::method(method),
                RequestMatcher::path(&format!("{CONTROL_PREFIX}{path}"))?,
            ])
        };

        let resolver = Arc::clone(&self.resolver);
        let app = AppBuilder::new(MOCK_APP)
            .route(
                RequestMatcher::method("*"),
                Handler::bound("serve", |svc: Arc<MockService>, request| async move {
                    svc.serve(request).await
                }),
            )
            .route(
                control("POST", "/register")?,
                Handler::bound("register", |svc: Arc<MockService>, request| async move {
                    svc.register(request).await
                }),
            )
            .route(
                control("DELETE", "/deregister")?,
                Handler::bound("deregister", |svc: Arc<MockService>, request| async move {
                    svc.deregister(request).await
                }),
            )
            .route(
                control("POST", "/reset")?,
                Handler::bound("reset", |svc: Arc<MockService>, request| async move {
                    svc.reset(request).await
                }),
            )
            .route(
                control("GET", "/history")?,
                Handler::bound("history", |svc: Arc<MockService>, request| async move {
                    svc.fetch_history(request).await
                }),
            )
            .route(
                control("GET", "")?,
                Handler::bound("summary", |svc: Arc<MockService>, request| async move {
                    svc.summary(request).await
                }),
            )
            .route(
                control("GET", "/handlers")?,
                Handler::bound("handlers", |svc: Arc<MockService>, request| async move {
                    svc.list_handlers(request).await
                }),
            )
            .route(
                control("GET", "/handlers/{id}")?,
                Handler::bound("handler", |svc: Arc<MockService>, request| async move {
                    svc.handler_detail(request).await
                }),
            )
            .route(
                control("GET", "/metrics")?,
                Handler::new("metrics", |_| async {
                    Ok(Response::new(200)
                        .with_header("content-type", "text/plain; version=0.0.4")
                        .with_body(metrics::collect_metrics()))
                }),
            )
            .register(&resolver, self);
        Ok(app)
    }

    /// Install a remote handler under `id` in the default app.
    ///
    /// An existing handler with the same id is replaced; its history stays.
    /// The handler, its matchers and its attributes become visible together.
    pub fn install_remote(
        &self,
        id: &str,
        matcher: RequestMatcher,
        response: ResponseTemplate,
        policy: Option<ExpirationPolicy>,
    ) {
        let template = response.clone();
        let handler = Handler::new(format!("remote:{id}"), move |request: Request| {
            let template = template.clone();
            async move { template.prepare(&request).await }
        });

        let policy = policy.map(Arc::new);
        let mut matchers = vec![matcher.clone().into_match_fn()];
        if let Some(policy) = &policy {
            let policy = Arc::clone(policy);
            let gate: MatchFn = Arc::new(move |_: &mut Request| !policy.is_expired());
            matchers.push(gate);
        }

        self.resolver.install_identified(
            id,
            &handler,
            matchers,
            vec![
                (attributes::MATCHER, Attribute::Matcher(matcher)),
                (attributes::RESPONSE, Attribute::Response(response)),
                (
                    attributes::EXPIRATION_POLICY,
                    Attribute::ExpirationPolicy(policy),
                ),
            ],
        );
        self.update_gauges();
    }

    /// Remove the remote handler `id` and purge its history. Unknown ids are ignored.
    pub fn remove_remote(&self, id: &str) -> bool {
        let found = self.resolver.remove_identified(id);
        self.history.delete_by_tag(id);
        self.update_gauges();
        found.is_some()
    }

    /// Remove every remote handler and clear history.
    pub fn clear(&self) -> usize {
        let default_app = self.resolver.default_app().clone();
        let handlers = self.resolver.get_handlers(&default_app);
        for handler in &handlers {
            self.resolver.deregister_handler(handler, &default_app);
        }
        self.history.clear();
        self.update_gauges();
        handlers.len()
    }

    pub(super) fn update_gauges(&self) {
        let handlers = self.resolver.get_handlers(self.resolver.default_app());
        metrics::set_remote_handlers(handlers.len());
        metrics::set_history_items(self.history.len());
    }

    /// Catch-all: resolve among remote handlers, serve, record history.
    async fn serve(&self, mut request: Request) -> HandlerResult {
        if request.is_control_plane() && request.path().starts_with(CONTROL_PREFIX) {
            let message = format!("Unknown control route {} {}", request.method(), request.path());
            return Ok(error_response(404, message));
        }

        let start = Instant::now();
        let default_app = App::detached(self.resolver.default_app().clone());
        let (handler, handler_id) = self
            .resolver
            .resolve_identified(&mut request, default_app.id());

        let chain = build_chain(
            &[],
            &self.resolver.get_middlewares(default_app.id()),
            &self.resolver.get_middlewares(&handler),
        );
        let response = Next::new(&chain, &handler, &default_app)
            .run(request.clone())
            .await?;

        let outcome = match &handler_id {
            Some(id) => {
                self.history.add(&request, &response, vec![id.clone()]);
                metrics::set_history_items(self.history.len());
                "mock"
            }
            None => "unmatched",
        };
        metrics::record_request(
            outcome,
            response.status(),
            start.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(response)
    }

    pub(super) fn summary_json(&self) -> serde_json::Value {
        let handlers = self.resolver.get_handlers(self.resolver.default_app());
        json!({
            "handlers": handlers.len(),
            "history": self.history.len(),
            "items": handlers
                .iter()
                .map(|handler| self.describe(handler))
                .collect::<Vec<_>>(),
        })
    }

    pub(super) fn describe(&self, handler: &Handler) -> serde_json::Value {
        let id = self.resolver.handler_id(handler);
        let attr = |name: &str| self.resolver.get_attribute(name, handler).ok();
        let matcher = attr(attributes::MATCHER)
            .and_then(|a| a.as_matcher().map(ToString::to_string));
        let response = attr(attributes::RESPONSE)
            .and_then(|a| a.as_response().map(|r| r.kind().to_string()));
        let policy = attr(attributes::EXPIRATION_POLICY)
            .and_then(|a| a.as_expiration_policy().map(|p| format!("{p:?}")));
        let history = id
            .as_deref()
            .map(|id| self.history.get_by_tag(id).len())
            .unwrap_or(0);
        json!({
            "id": id,
            "matcher": matcher,
            "response": response,
            "expiration_policy": policy,
            "history": history,
        })
    }
}
