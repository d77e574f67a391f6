//! jj-mock: a remote-controlled HTTP mock server.
//!
//! A test process installs predicate-matched fake endpoints ("mocks") into a
//! running server over plain HTTP, observes the requests they received and
//! removes them again.
//!
//! ## Module Structure
//!
//! - `registry`: ordered `(owner, namespace) -> key -> value` store
//! - `resolver`: apps, handlers, matchers and attributes plus request resolution
//! - `matcher`: attribute matchers, request-facet matchers and `All`/`Any`
//! - `middleware`: root/app/handler middleware chain
//! - `expiration`: policies deciding when a mock stops matching
//! - `history`: tagged log of served request/response pairs
//! - `packing`: type-tagged wire format for matchers, responses and policies
//! - `mock`: the control-plane service (`/__jj__/...`)
//! - `remote`: test-side client for the control plane
//! - `server`: hyper transport and dispatch

pub mod config;
pub mod expiration;
pub mod history;
pub mod matcher;
pub mod metrics;
pub mod middleware;
pub mod mock;
pub mod packing;
pub mod registry;
pub mod remote;
pub mod request;
pub mod resolver;
pub mod response;
pub mod server;

pub use expiration::ExpirationPolicy;
pub use matcher::{AttributeMatcher, MultiDictMatcher, RequestMatcher, RouteMatcher};
pub use remote::{Mocked, RemoteHandler, RemoteMock};
pub use request::{MultiDict, Request};
pub use resolver::{App, AppId, Handler, HandlerId, Resolver};
pub use response::{
    DelayedResponse, RelayResponse, Response, ResponseTemplate, StaticResponse, TemplateResponse,
    TunnelResponse,
};
