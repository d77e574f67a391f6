//! Request to handler resolution.
//!
//! The resolver indexes apps, handlers, matchers and attributes in a
//! [`Registry`](crate::registry::Registry) and picks the handler that serves
//! a request. [`Resolver::reversed`] builds the last-registered-wins variant
//! the mock control plane uses.

mod app;
mod resolution;
mod types;


pub use app::AppBuilder;
pub use resolution::{MatchFn, ResolutionOrder, Resolver};
pub use types::{
    attributes, App, AppId, Attribute, Handler, HandlerFuture, HandlerId, HandlerResult, Owner,
    ResolverError,
};
