//! Graph materializer
//!
//! Breadth-first expansion of relation links into a [`ResourceGraph`],
//! bounded by a maximum depth and by a [`RelationPolicy`]. Every URL is
//! resolved through the [`FetchCache`], so a resource reached from two
//! parents is the same node under both. The resulting graph usually has
//! cycles (a space's `organization` is the org holding it in `spaces`).
//!
//! Fetches are awaited one at a time; nothing here runs concurrently.

use super::cache::FetchCache;
use super::fetcher::{self, Payload};
use super::graph::{NodeId, ResourceGraph, Resolved};
use super::model::RawResource;
use super::policy::RelationPolicy;
use crate::cc::CcApi;
use crate::error::Result;
use std::collections::VecDeque;

pub struct Materializer<'a, A: CcApi> {
    api: &'a A,
    policy: RelationPolicy,
    max_depth: usize,
    graph: ResourceGraph,
    cache: FetchCache,
}

impl<'a, A: CcApi> Materializer<'a, A> {
    pub fn new(api: &'a A, policy: RelationPolicy, max_depth: usize) -> Self {
        Self {
            api,
            policy,
            max_depth,
            graph: ResourceGraph::new(),
            cache: FetchCache::new(),
        }
    }

    /// Resolve `url` and expand relations below it
    ///
    /// The members of a root collection sit at depth 0.
    pub async fn materialize(&mut self, url: &str) -> Result<Resolved> {
        tracing::info!(
            "Materializing {} (max depth {})",
            url,
            self.max_depth
        );

        let root = self.resolve(url).await?;
        let mut queue: VecDeque<(NodeId, usize)> = self
            .graph
            .members(root)
            .into_iter()
            .map(|id| (id, 0))
            .collect();

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= self.max_depth {
                continue;
            }

            for (relation, child_url) in self.graph.pending_relations(node) {
                if !self.policy.follow(&relation) {
                    continue;
                }

                let child = self.resolve(&child_url).await?;
                self.graph.set_relation(node, &relation, child.into());
                queue.extend(self.graph.members(child).into_iter().map(|id| (id, depth + 1)));
            }
        }

        tracing::info!(
            "Materialized {}: {} resources, {} cached URLs",
            url,
            self.graph.node_count(),
            self.cache.len()
        );

        Ok(root)
    }

    /// Get-or-compute through the cache
    async fn resolve(&mut self, url: &str) -> Result<Resolved> {
        if let Some(hit) = self.cache.get(url) {
            tracing::trace!("cache hit {}", url);
            return Ok(hit);
        }

        let raw = fetcher::fetch_json(self.api, url).await?;
        let resolved = match fetcher::decode(url, raw)? {
            Payload::Single(resource) => Resolved::Single(self.intern(resource)),
            Payload::Collection(first) => {
                let stitched = fetcher::stitch(self.api, url, first).await?;
                let members = stitched
                    .resources
                    .into_iter()
                    .map(|resource| self.intern(resource))
                    .collect();
                Resolved::Collection(self.graph.add_list(members))
            }
        };

        Ok(self.cache.insert(url, resolved))
    }

    /// Node for a fetched resource, reusing the instance already known for its URL
    fn intern(&mut self, resource: RawResource) -> NodeId {
        let url = resource.url().to_string();
        if let Some(existing) = self.cache.single(&url) {
            return existing;
        }
        let id = self.graph.add_resource(resource);
        self.cache.insert(&url, Resolved::Single(id));
        id
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    pub fn into_graph(self) -> ResourceGraph {
        self.graph
    }
}
