//! Resource graph engine
//!
//! Turns the paginated, hypermedia-linked v2 API into a finite snapshot.
//!
//! # Architecture
//!
//! - [`fetcher`] - Collection/single discriminator and pagination stitcher
//! - [`cache`] - URL-keyed memoization for one traversal
//! - [`policy`] - Relation whitelists and traversal roots
//! - [`materialize`] - Breadth-first relation expansion into a shared graph
//! - [`breaker`] - Converts the shared graph into owned trees
//! - [`graph`] - Arena storage for nodes and collection lists
//! - [`model`] - Wire shapes and the tree form
//!
//! # Example
//!
//! ```ignore
//! use cfbackup::resource::{break_resolved, Materializer, TraversalRoot};
//!
//! async fn orgs(api: &impl cfbackup::cc::CcApi) -> cfbackup::error::Result<()> {
//!     let root = TraversalRoot::Organizations;
//!     let mut materializer = Materializer::new(api, root.policy(), root.max_depth());
//!     let resolved = materializer.materialize(root.url()).await?;
//!     let trees = break_resolved(materializer.graph(), resolved);
//!     Ok(())
//! }
//! ```

pub mod breaker;
pub mod cache;
pub mod fetcher;
pub mod graph;
pub mod json;
pub mod materialize;
pub mod model;
pub mod policy;

pub use breaker::{break_cycles, break_resolved};
pub use cache::FetchCache;
pub use graph::{ListId, NodeId, ResourceGraph, Resolved, Slot};
pub use materialize::Materializer;
pub use model::{EntityValue, RawResource, ResourceCollection, ResourceModel, URL_SUFFIX};
pub use policy::{RelationPolicy, TraversalRoot};
