//! Test-side client for the control plane.
//!
//! ```no_run
//! # async fn demo() -> Result<(), jj_mock::remote::RemoteError> {
//! use jj_mock::{RemoteMock, RequestMatcher, StaticResponse};
//!
//! let mock = RemoteMock::new("http://127.0.0.1:8080");
//! let handler = mock.create_handler(RequestMatcher::method("GET"), StaticResponse::text("hi"));
//! handler.register().await?;
//! // ... exercise the system under test ...
//! let served = handler.fetch_history().await?;
//! handler.deregister().await?;
//! # let _ = served;
//! # Ok(())
//! # }
//! ```

mod client;
mod handler;

pub use client::RemoteMock;
pub use handler::{Mocked, RemoteHandler};

use crate::packing::PackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("control request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("control plane returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("failed to pack or unpack payload: {0}")]
    Pack(#[from] PackError),

    #[error("unexpected control response: {0}")]
    Parse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
