use super::{HistoryItem, HistoryRequest, HistoryResponse};
use crate::request::Request;
use crate::response::Response;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::debug;

/// In-memory history, newest first.
///
/// With a limit set, the oldest items are dropped once it is reached.
#[derive(Debug, Default)]
pub struct HistoryRepository {
    items: RwLock<VecDeque<HistoryItem>>,
    limit: Option<usize>,
}

impl HistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            items: RwLock::new(VecDeque::new()),
            limit,
        }
    }

    /// Snapshot `request`/`response` and prepend the pair.
    pub fn add(&self, request: &Request, response: &Response, tags: Vec<String>) {
        let item = HistoryItem {
            request: HistoryRequest::from(request),
            response: HistoryResponse::from(response),
            tags,
            created_at: Utc::now(),
        };
        let mut items = self.items.write();
        items.push_front(item);
        if let Some(limit) = self.limit {
            while items.len() > limit {
                items.pop_back();
            }
        }
    }

    /// Items carrying `tag`, newest first.
    pub fn get_by_tag(&self, tag: &str) -> Vec<HistoryItem> {
        self.items
            .read()
            .iter()
            .filter(|item| item.has_tag(tag))
            .cloned()
            .collect()
    }

    /// Remove every item carrying `tag`; returns how many were removed.
    pub fn delete_by_tag(&self, tag: &str) -> usize {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|item| !item.has_tag(tag));
        let removed = before - items.len();
        if removed > 0 {
            debug!("Purged {} history items tagged {}", removed, tag);
        }
        removed
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    /// All items, newest first.
    pub fn all(&self) -> Vec<HistoryItem> {
        self.items.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}
