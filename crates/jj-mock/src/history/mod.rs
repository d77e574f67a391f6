//! Tagged log of served request/response pairs.
//!
//! - `repository`: the newest-first store and its tag queries
//! - `adapter`: presentation of raw bodies as JSON, text or base64

mod adapter;
mod repository;

pub use adapter::{ContentTypeAdapter, HistoryAdapter};
pub use repository::HistoryRepository;

use crate::request::Request;
use crate::response::Response;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Snapshot of an inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub method: String,
    pub path: String,
    pub segments: BTreeMap<String, String>,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl From<&Request> for HistoryRequest {
    fn from(request: &Request) -> Self {
        Self {
            method: request.method().to_string(),
            path: request.path().to_string(),
            segments: request
                .segments()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            params: request.query().to_pairs(),
            headers: request.headers().to_pairs(),
            body: request.body().clone(),
        }
    }
}

/// Snapshot of a served response. Streamed bodies are recorded as empty.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl From<&Response> for HistoryResponse {
    fn from(response: &Response) -> Self {
        Self {
            status: response.status(),
            reason: response.reason().to_string(),
            headers: response.headers().to_vec(),
            body: response.body_bytes().cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub request: HistoryRequest,
    pub response: HistoryResponse,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryItem {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
