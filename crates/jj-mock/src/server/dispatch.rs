//! Per-request dispatch: resolve, build the middleware chain, run it.

use crate::metrics;
use crate::middleware::{build_chain, LoggingMiddleware, Middleware, Next, SelfMiddleware};
use crate::mock::error_response;
use crate::request::Request;
use crate::resolver::{App, Resolver};
use crate::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Routes requests for one app through the resolver.
pub struct Dispatcher {
    resolver: Arc<Resolver>,
    app: App,
    root: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    /// Dispatcher with the default root tier: logging, then self-binding.
    pub fn new(resolver: Arc<Resolver>, app: App) -> Self {
        Self::with_root(
            resolver,
            app,
            vec![Arc::new(LoggingMiddleware), Arc::new(SelfMiddleware)],
        )
    }

    pub fn with_root(resolver: Arc<Resolver>, app: App, root: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            resolver,
            app,
            root,
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    /// Dispatch one request. Handler failures become a 500 JSON response.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let start = Instant::now();
        let control = request.is_control_plane();
        let method = request.method().to_string();
        let path = request.path().to_string();

        let handler = self.resolver.resolve(&mut request, self.app.id());
        let chain = build_chain(
            &self.root,
            &self.resolver.get_middlewares(self.app.id()),
            &self.resolver.get_middlewares(&handler),
        );

        let result = Next::new(&chain, &handler, &self.app).run(request).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(response) => {
                if control {
                    metrics::record_request("control", response.status(), elapsed_ms);
                }
                response
            }
            Err(e) => {
                error!(
                    method = %method,
                    path = %path,
                    handler = handler.name(),
                    "Handler failed: {}",
                    e
                );
                metrics::record_request("error", 500, elapsed_ms);
                error_response(500, e.to_string())
            }
        }
    }
}
