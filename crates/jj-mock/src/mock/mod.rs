//! Remote-mock control plane.
//!
//! Exposes register/deregister/reset/history over `/__jj__/...`, gated by the
//! `x-jj-remote-mock` header, and serves registered mocks through a
//! catch-all route that records history.

mod handlers;
mod service;
mod types;

#[cfg(test)]
mod tests;

pub use service::{not_found_handler, MockService, CONTROL_PREFIX, MOCK_APP};
pub use types::{error_response, json_response, ok_response, HandlerRef, RegisterPayload};
