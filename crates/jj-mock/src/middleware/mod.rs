//! Layered middleware chain.
//!
//! Middlewares come from three tiers:
//!
//! - root: handed to the dispatcher at server start, applies to every request
//! - app: stored under the app's `middlewares` attribute
//! - handler: stored under the handler's `middlewares` attribute
//!
//! [`build_chain`] merges them per dispatch into one outer-to-inner list.
//! Each middleware receives a [`Next`] and decides whether and when to call
//! the rest of the chain.

mod logging;
mod self_binding;

pub use logging::LoggingMiddleware;
pub use self_binding::SelfMiddleware;

use crate::request::Request;
use crate::resolver::{App, Handler, HandlerResult};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Identity used to deduplicate the same middleware across tiers.
    fn name(&self) -> &str;

    async fn handle(&self, request: Request, next: Next<'_>) -> HandlerResult;
}

/// The remainder of a chain: inner middlewares, then the handler.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    handler: &'a Handler,
    app: &'a App,
    bind_app: bool,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Middleware>], handler: &'a Handler, app: &'a App) -> Self {
        Self {
            chain,
            handler,
            app,
            bind_app: false,
        }
    }

    /// The handler at the end of the chain.
    pub fn handler(&self) -> &Handler {
        self.handler
    }

    pub fn app(&self) -> &App {
        self.app
    }

    /// Pass the app instance to the handler when it is finally called.
    pub fn bind_app(mut self) -> Self {
        self.bind_app = true;
        self
    }

    pub async fn run(self, request: Request) -> HandlerResult {
        match self.chain.split_first() {
            Some((outer, rest)) => {
                let next = Next {
                    chain: rest,
                    ..self
                };
                outer.handle(request, next).await
            }
            None => {
                let app = self.bind_app.then_some(self.app);
                self.handler.call(app, request).await
            }
        }
    }
}

fn contains(chain: &[Arc<dyn Middleware>], middleware: &Arc<dyn Middleware>) -> bool {
    chain.iter().any(|m| m.name() == middleware.name())
}

/// Merge the three tiers into invocation order, outermost first.
///
/// App entries also present in the handler tier are dropped so the handler
/// occurrence wins; root entries already represented in either tier are
/// skipped. The result runs root, then app, then handler middlewares.
pub fn build_chain(
    root: &[Arc<dyn Middleware>],
    app_tier: &[Arc<dyn Middleware>],
    handler_tier: &[Arc<dyn Middleware>],
) -> Vec<Arc<dyn Middleware>> {
    let mut scoped: Vec<Arc<dyn Middleware>> = app_tier
        .iter()
        .filter(|m| !contains(handler_tier, m))
        .cloned()
        .collect();
    for middleware in handler_tier {
        if !contains(&scoped, middleware) {
            scoped.push(Arc::clone(middleware));
        }
    }

    let mut chain: Vec<Arc<dyn Middleware>> = Vec::with_capacity(root.len() + scoped.len());
    for middleware in root {
        if !contains(&scoped, middleware) && !contains(&chain, middleware) {
            chain.push(Arc::clone(middleware));
        }
    }
    chain.extend(scoped);
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AppId;
    use crate::response::{DispatchError, Response};
    use parking_lot::Mutex;

    /// Records entry and exit into a shared trace.
    struct Tracing {
        name: &'static str,
        label: &'static str,
        trace: Arc<Mutex<Vec<String>>>,
    }

    impl Tracing {
        fn new(
            name: &'static str,
            label: &'static str,
            trace: &Arc<Mutex<Vec<String>>>,
        ) -> Arc<dyn Middleware> {
            Arc::new(Self {
                name,
                label,
                trace: Arc::clone(trace),
            })
        }
    }

    #[async_trait]
    impl Middleware for Tracing {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, request: Request, next: Next<'_>) -> HandlerResult {
            self.trace.lock().push(format!("enter {}", self.label));
            let response = next.run(request).await;
            self.trace.lock().push(format!("exit {}", self.label));
            response
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        fn name(&self) -> &str {
            "short"
        }

        async fn handle(&self, _request: Request, _next: Next<'_>) -> HandlerResult {
            Ok(Response::new(403))
        }
    }

    fn labels(chain: &[Arc<dyn Middleware>]) -> Vec<&str> {
        chain.iter().map(|m| m.name()).collect()
    }

    #[test]
    fn test_build_chain_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let root = vec![Tracing::new("root", "root", &trace)];
        let app = vec![Tracing::new("app", "app", &trace)];
        let handler = vec![Tracing::new("handler", "handler", &trace)];

        let chain = build_chain(&root, &app, &handler);
        assert_eq!(labels(&chain), vec!["root", "app", "handler"]);
    }

    #[test]
    fn test_handler_tier_wins_over_app_tier() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let app = vec![
            Tracing::new("auth", "app-auth", &trace),
            Tracing::new("app", "app", &trace),
        ];
        let handler = vec![Tracing::new("auth", "handler-auth", &trace)];

        let chain = build_chain(&[], &app, &handler);
        assert_eq!(labels(&chain), vec!["app", "auth"]);
        assert!(Arc::ptr_eq(&chain[1], &handler[0]));
    }

    #[test]
    fn test_root_skipped_when_represented() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let root = vec![
            Tracing::new("log", "root-log", &trace),
            Tracing::new("self", "root-self", &trace),
        ];
        let app = vec![Tracing::new("log", "app-log", &trace)];

        let chain = build_chain(&root, &app, &[]);
        assert_eq!(labels(&chain), vec!["self", "log"]);
        assert!(Arc::ptr_eq(&chain[1], &app[0]));
    }

    #[tokio::test]
    async fn test_run_wraps_outer_to_inner() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let chain = build_chain(
            &[Tracing::new("root", "root", &trace)],
            &[Tracing::new("app", "app", &trace)],
            &[Tracing::new("handler", "handler", &trace)],
        );
        let handler_trace = Arc::clone(&trace);
        let handler = Handler::new("inner", move |_| {
            let trace = Arc::clone(&handler_trace);
            async move {
                trace.lock().push("handler called".to_string());
                Ok(Response::text("ok"))
            }
        });
        let app = App::detached(AppId::new("app"));

        let response = Next::new(&chain, &handler, &app)
            .run(Request::new("GET", "/"))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            *trace.lock(),
            vec![
                "enter root",
                "enter app",
                "enter handler",
                "handler called",
                "exit handler",
                "exit app",
                "exit root",
            ]
        );
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(ShortCircuit)];
        let handler = Handler::new("never", |_| async {
            Err(DispatchError::InvalidResponse("handler must not run".into()))
        });
        let app = App::detached(AppId::new("app"));

        let response = Next::new(&chain, &handler, &app)
            .run(Request::new("GET", "/"))
            .await
            .unwrap();
        assert_eq!(response.status(), 403);
    }
}
