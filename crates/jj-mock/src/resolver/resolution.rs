//! Resolver: app/handler/matcher/attribute bookkeeping and resolution.

use super::types::{attributes, AppId, Attribute, Handler, HandlerId, Owner, ResolverError};
use crate::middleware::Middleware;
use crate::registry::Registry;
use crate::request::Request;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Predicate stored for a handler. May write route segments onto the request.
pub type MatchFn = Arc<dyn Fn(&mut Request) -> bool + Send + Sync>;

const APPS: &str = "apps";
const HANDLERS: &str = "handlers";
const MATCHERS: &str = "matchers";
const ATTRIBUTES: &str = "attributes";

/// Order in which an app's handlers are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionOrder {
    /// Registration order; the first registered handler wins
    #[default]
    FirstRegistered,
    /// Reverse registration order; the last registered handler wins
    LastRegistered,
}

#[derive(Default)]
struct Tables {
    apps: Registry<Owner, AppId, ()>,
    handlers: Registry<Owner, HandlerId, Handler>,
    matchers: Registry<Owner, u64, MatchFn>,
    attributes: Registry<Owner, String, Attribute>,
    next_matcher: u64,
}

impl Tables {
    fn is_registered(&self, handler: HandlerId) -> bool {
        self.apps
            .keys(&Owner::Resolver, APPS)
            .any(|app| self.handlers.contains(&Owner::App(app.clone()), HANDLERS, &handler))
    }

    fn handler_id(&self, handler: &Handler) -> Option<&str> {
        self.attributes
            .get_value(
                &Owner::from(handler),
                ATTRIBUTES,
                &attributes::HANDLER_ID.to_string(),
            )
            .and_then(Attribute::as_text)
    }

    fn find_by_id(&self, app: &AppId, id: &str) -> Option<Handler> {
        self.handlers
            .get(&Owner::App(app.clone()), HANDLERS)
            .iter()
            .map(|(_, handler)| handler)
            .find(|handler| self.handler_id(handler) == Some(id))
            .cloned()
    }

    fn detach(&mut self, handler: &Handler, app: &AppId) {
        self.handlers
            .remove(&Owner::App(app.clone()), HANDLERS, &handler.id());
        let owner = Owner::from(handler);
        self.matchers.remove_owner(&owner);
        self.attributes.remove_owner(&owner);
    }

    fn push_matcher(&mut self, handler: &Handler, matcher: MatchFn) {
        let key = self.next_matcher;
        self.next_matcher += 1;
        self.matchers
            .add(Owner::from(handler), MATCHERS, key, matcher);
    }

    fn attach(&mut self, handler: &Handler, app: &AppId, default_app: &AppId) {
        self.handlers
            .remove(&Owner::App(default_app.clone()), HANDLERS, &handler.id());
        self.apps.add_key(Owner::Resolver, APPS, app.clone());
        self.handlers
            .add(Owner::App(app.clone()), HANDLERS, handler.id(), handler.clone());
    }
}

/// Registry-backed index of apps, handlers, matchers and attributes.
///
/// All mutations go through one lock; resolution works on a snapshot taken
/// under the read lock, so it never observes a half-applied registration.
pub struct Resolver {
    tables: RwLock<Tables>,
    default_app: AppId,
    default_handler: Handler,
    order: ResolutionOrder,
}

impl Resolver {
    /// Resolver where the first registered matching handler wins.
    pub fn new(default_handler: Handler) -> Self {
        Self::with_order(default_handler, ResolutionOrder::FirstRegistered)
    }

    /// Resolver where the last registered matching handler wins.
    pub fn reversed(default_handler: Handler) -> Self {
        Self::with_order(default_handler, ResolutionOrder::LastRegistered)
    }

    pub fn with_order(default_handler: Handler, order: ResolutionOrder) -> Self {
        let default_app = AppId::default_app();
        let mut tables = Tables::default();
        tables.apps.add_key(Owner::Resolver, APPS, default_app.clone());
        Self {
            tables: RwLock::new(tables),
            default_app,
            default_handler,
            order,
        }
    }

    pub fn default_app(&self) -> &AppId {
        &self.default_app
    }

    pub fn default_handler(&self) -> &Handler {
        &self.default_handler
    }

    pub fn order(&self) -> ResolutionOrder {
        self.order
    }

    // ===== Apps and handlers =====

    /// Idempotent.
    pub fn register_app(&self, app: &AppId) {
        self.tables
            .write()
            .apps
            .add_key(Owner::Resolver, APPS, app.clone());
    }

    pub fn get_apps(&self) -> Vec<AppId> {
        self.tables
            .read()
            .apps
            .keys(&Owner::Resolver, APPS)
            .cloned()
            .collect()
    }

    /// Move `handler` from the default app to `app`. Idempotent.
    pub fn register_handler(&self, handler: &Handler, app: &AppId) {
        self.tables.write().attach(handler, app, &self.default_app);
    }

    /// Remove `handler` from `app` together with its matchers and attributes.
    /// Unknown handlers are ignored.
    pub fn deregister_handler(&self, handler: &Handler, app: &AppId) {
        self.tables.write().detach(handler, app);
    }

    /// Install `handler` in the default app under `id` in one step.
    ///
    /// Any handler already carrying `id` is removed, then `handler` is added
    /// with its matchers, its `handler_id` attribute and `attrs`. Concurrent
    /// resolution sees either the old registration or the complete new one.
    /// Returns the replaced handler.
    pub fn install_identified(
        &self,
        id: &str,
        handler: &Handler,
        matchers: Vec<MatchFn>,
        attrs: Vec<(&str, Attribute)>,
    ) -> Option<Handler> {
        let app = &self.default_app;
        let mut tables = self.tables.write();
        let previous = tables.find_by_id(app, id);
        if let Some(previous) = &previous {
            tables.detach(previous, app);
        }

        tables.attach(handler, app, app);
        for matcher in matchers {
            tables.push_matcher(handler, matcher);
        }
        let owner = Owner::from(handler);
        tables.attributes.add(
            owner.clone(),
            ATTRIBUTES,
            attributes::HANDLER_ID.to_string(),
            Attribute::Text(id.to_string()),
        );
        for (name, value) in attrs {
            tables
                .attributes
                .add(owner.clone(), ATTRIBUTES, name.to_string(), value);
        }
        previous
    }

    /// Remove the default-app handler carrying `id`, in one step.
    pub fn remove_identified(&self, id: &str) -> Option<Handler> {
        let app = &self.default_app;
        let mut tables = self.tables.write();
        let found = tables.find_by_id(app, id);
        if let Some(handler) = &found {
            tables.detach(handler, app);
        }
        found
    }

    /// Handlers of `app` in resolution order.
    pub fn get_handlers(&self, app: &AppId) -> Vec<Handler> {
        let tables = self.tables.read();
        let entries = tables.handlers.get(&Owner::App(app.clone()), HANDLERS);
        let handlers = entries.iter().map(|(_, handler)| handler.clone());
        match self.order {
            ResolutionOrder::FirstRegistered => handlers.collect(),
            ResolutionOrder::LastRegistered => handlers.rev().collect(),
        }
    }

    // ===== Matchers =====

    /// Append `matcher` to the handler's matcher list.
    ///
    /// A handler that is not yet registered anywhere lands in the default app.
    pub fn register_matcher(&self, matcher: MatchFn, handler: &Handler) {
        let mut tables = self.tables.write();
        if !tables.is_registered(handler.id()) {
            tables.attach(handler, &self.default_app, &self.default_app);
        }
        tables.push_matcher(handler, matcher);
    }

    pub fn get_matchers(&self, handler: &Handler) -> Vec<MatchFn> {
        self.tables
            .read()
            .matchers
            .get(&Owner::from(handler), MATCHERS)
            .iter()
            .map(|(_, matcher)| Arc::clone(matcher))
            .collect()
    }

    pub fn deregister_matchers(&self, handler: &Handler) {
        self.tables
            .write()
            .matchers
            .remove_owner(&Owner::from(handler));
    }

    // ===== Attributes =====

    pub fn register_attribute(&self, name: &str, value: Attribute, owner: impl Into<Owner>) {
        self.tables
            .write()
            .attributes
            .add(owner.into(), ATTRIBUTES, name.to_string(), value);
    }

    /// Attribute value; a missing attribute is an error, distinct from any value.
    pub fn get_attribute(
        &self,
        name: &str,
        owner: impl Into<Owner>,
    ) -> Result<Attribute, ResolverError> {
        let owner = owner.into();
        self.tables
            .read()
            .attributes
            .get_value(&owner, ATTRIBUTES, &name.to_string())
            .cloned()
            .ok_or_else(|| ResolverError::MissingAttribute {
                name: name.to_string(),
                owner,
            })
    }

    pub fn get_attribute_or(
        &self,
        name: &str,
        owner: impl Into<Owner>,
        default: Attribute,
    ) -> Attribute {
        self.get_attribute(name, owner).unwrap_or(default)
    }

    /// No-op when absent.
    pub fn deregister_attribute(&self, name: &str, owner: impl Into<Owner>) {
        self.tables
            .write()
            .attributes
            .remove(&owner.into(), ATTRIBUTES, &name.to_string());
    }

    /// `handler_id` attribute of a handler, if it has one.
    pub fn handler_id(&self, handler: &Handler) -> Option<String> {
        self.tables.read().handler_id(handler).map(str::to_string)
    }

    /// Handler of `app` whose `handler_id` attribute equals `id`.
    pub fn find_handler_by_id(&self, app: &AppId, id: &str) -> Option<Handler> {
        self.tables.read().find_by_id(app, id)
    }

    // ===== Middlewares =====

    /// Append `middleware` to the owner's `middlewares` attribute.
    pub fn register_middleware(&self, middleware: Arc<dyn Middleware>, owner: impl Into<Owner>) {
        let owner = owner.into();
        let mut tables = self.tables.write();
        let mut chain = match tables
            .attributes
            .get_value(&owner, ATTRIBUTES, &attributes::MIDDLEWARES.to_string())
        {
            Some(Attribute::Middlewares(chain)) => chain.clone(),
            _ => Vec::new(),
        };
        chain.push(middleware);
        tables.attributes.add(
            owner,
            ATTRIBUTES,
            attributes::MIDDLEWARES.to_string(),
            Attribute::Middlewares(chain),
        );
    }

    pub fn get_middlewares(&self, owner: impl Into<Owner>) -> Vec<Arc<dyn Middleware>> {
        match self.get_attribute(attributes::MIDDLEWARES, owner) {
            Ok(Attribute::Middlewares(chain)) => chain,
            _ => Vec::new(),
        }
    }

    // ===== Resolution =====

    /// First handler of `app` (in resolution order) whose matchers all pass,
    /// or the default handler.
    ///
    /// Matchers of one handler are AND-ed in registration order and stop at
    /// the first failure. Route segments left by a handler that did not match
    /// are cleared before the next one is tried.
    pub fn resolve(&self, request: &mut Request, app: &AppId) -> Handler {
        self.resolve_identified(request, app).0
    }

    /// [`Resolver::resolve`] plus the winner's `handler_id`, read from the
    /// same snapshot as its matchers.
    pub fn resolve_identified(
        &self,
        request: &mut Request,
        app: &AppId,
    ) -> (Handler, Option<String>) {
        let candidates: Vec<(Handler, Vec<MatchFn>, Option<String>)> = {
            let tables = self.tables.read();
            let entries = tables.handlers.get(&Owner::App(app.clone()), HANDLERS);
            let snapshot = |(_, handler): &(HandlerId, Handler)| {
                let matchers = tables
                    .matchers
                    .get(&Owner::from(handler), MATCHERS)
                    .iter()
                    .map(|(_, m)| Arc::clone(m))
                    .collect();
                let id = tables.handler_id(handler).map(str::to_string);
                (handler.clone(), matchers, id)
            };
            match self.order {
                ResolutionOrder::FirstRegistered => entries.iter().map(snapshot).collect(),
                ResolutionOrder::LastRegistered => entries.iter().rev().map(snapshot).collect(),
            }
        };

        for (handler, matchers, id) in candidates {
            if matchers.iter().all(|matcher| matcher(request)) {
                debug!(
                    app = %app,
                    handler = handler.name(),
                    method = request.method(),
                    path = request.path(),
                    "Resolved handler"
                );
                return (handler, id);
            }
            request.clear_segments();
        }

        debug!(
            app = %app,
            method = request.method(),
            path = request.path(),
            "No handler matched, using default"
        );
        (self.default_handler.clone(), None)
    }
}
