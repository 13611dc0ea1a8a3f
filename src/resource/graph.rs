//! Arena-backed resource graph
//!
//! Nodes and collection lists live in two vectors and refer to each other by
//! index. Several parents may point at the same [`NodeId`] or [`ListId`];
//! that sharing is what the cycle breaker later removes.

use super::model::{relation_name, RawResource};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a relation link resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Single(NodeId),
    Collection(ListId),
}

/// Entry in a node's entity map
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Value(Value),
    Node(NodeId),
    List(ListId),
}

impl From<Resolved> for Slot {
    fn from(resolved: Resolved) -> Self {
        match resolved {
            Resolved::Single(id) => Slot::Node(id),
            Resolved::Collection(id) => Slot::List(id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub metadata: Map<String, Value>,
    pub entity: BTreeMap<String, Slot>,
    /// Only metadata is known so far
    pub stub: bool,
}

#[derive(Debug, Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    lists: Vec<Vec<NodeId>>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource(&mut self, raw: RawResource) -> NodeId {
        let entity = raw
            .entity
            .into_iter()
            .map(|(k, v)| (k, Slot::Value(v)))
            .collect();
        self.push(Node {
            metadata: raw.metadata,
            entity,
            stub: false,
        })
    }

    pub fn add_stub(&mut self, metadata: Map<String, Value>) -> NodeId {
        self.push(Node {
            metadata,
            entity: BTreeMap::new(),
            stub: true,
        })
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_list(&mut self, members: Vec<NodeId>) -> ListId {
        self.lists.push(members);
        ListId(self.lists.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn list(&self, id: ListId) -> &[NodeId] {
        &self.lists[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Members of a resolved value, in order
    pub fn members(&self, resolved: Resolved) -> Vec<NodeId> {
        match resolved {
            Resolved::Single(id) => vec![id],
            Resolved::Collection(id) => self.list(id).to_vec(),
        }
    }

    pub fn url(&self, id: NodeId) -> Option<&str> {
        self.node(id).metadata.get("url").and_then(|v| v.as_str())
    }

    pub fn guid(&self, id: NodeId) -> Option<&str> {
        self.node(id).metadata.get("guid").and_then(|v| v.as_str())
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&Value> {
        match self.node(id).entity.get(key)? {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn attr_str(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attr(id, key).and_then(|v| v.as_str())
    }

    pub fn child(&self, id: NodeId, relation: &str) -> Option<NodeId> {
        match self.node(id).entity.get(relation)? {
            Slot::Node(child) => Some(*child),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId, relation: &str) -> &[NodeId] {
        match self.node(id).entity.get(relation) {
            Some(Slot::List(list)) => self.list(*list),
            _ => &[],
        }
    }

    pub fn set_relation(&mut self, id: NodeId, relation: &str, slot: Slot) {
        self.node_mut(id).entity.insert(relation.to_string(), slot);
    }

    /// Relation links on `id` that have not been expanded yet
    ///
    /// Yields `(name, url)` for every `<name>_url` string whose sibling
    /// `<name>` key is absent.
    pub fn pending_relations(&self, id: NodeId) -> Vec<(String, String)> {
        let entity = &self.node(id).entity;
        entity
            .iter()
            .filter_map(|(key, slot)| {
                let name = relation_name(key)?;
                let Slot::Value(Value::String(url)) = slot else {
                    return None;
                };
                if url.is_empty() || entity.contains_key(name) {
                    return None;
                }
                Some((name.to_string(), url.clone()))
            })
            .collect()
    }
}
