//! Explicit app construction.

use super::resolution::Resolver;
use super::types::{App, AppId, Handler};
use crate::matcher::RequestMatcher;
use crate::middleware::Middleware;
use std::sync::Arc;

/// Collects an app's routes and middlewares, then installs them in a resolver.
///
/// Routes are registered in the order they were added.
pub struct AppBuilder {
    id: AppId,
    routes: Vec<(RequestMatcher, Handler)>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl AppBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            id: AppId::new(name),
            routes: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    pub fn route(mut self, matcher: RequestMatcher, handler: Handler) -> Self {
        self.routes.push((matcher, handler));
        self
    }

    /// App-tier middleware.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn id(&self) -> &AppId {
        &self.id
    }

    pub fn register<A: Send + Sync + 'static>(self, resolver: &Resolver, instance: Arc<A>) -> App {
        resolver.register_app(&self.id);
        for middleware in self.middlewares {
            resolver.register_middleware(middleware, &self.id);
        }
        for (matcher, handler) in self.routes {
            resolver.register_handler(&handler, &self.id);
            matcher.attach(resolver, handler);
        }
        App::new(self.id, instance)
    }
}
