//! Fetch cache
//!
//! One memoization table from canonical resource URL to the node or list it
//! resolved to. A cache lives for one traversal and is dropped with it.

use super::graph::{ListId, NodeId, Resolved};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct FetchCache {
    entries: HashMap<String, Resolved>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Resolved> {
        self.entries.get(url).copied()
    }

    /// Node cached under `url`, if the entry is a single resource
    pub fn single(&self, url: &str) -> Option<NodeId> {
        match self.get(url)? {
            Resolved::Single(id) => Some(id),
            Resolved::Collection(_) => None,
        }
    }

    pub fn collection(&self, url: &str) -> Option<ListId> {
        match self.get(url)? {
            Resolved::Collection(id) => Some(id),
            Resolved::Single(_) => None,
        }
    }

    /// Insert unless `url` is already cached; returns the cached entry
    pub fn insert(&mut self, url: &str, resolved: Resolved) -> Resolved {
        *self.entries.entry(url.to_string()).or_insert(resolved)
    }

    /// Return the entry for `url`, computing it on a miss
    pub fn get_or_insert_with(&mut self, url: &str, compute: impl FnOnce() -> Resolved) -> Resolved {
        if let Some(hit) = self.get(url) {
            tracing::trace!("cache hit {}", url);
            return hit;
        }
        self.insert(url, compute())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
