//! Cycle breaker
//!
//! Turns a materialized graph (shared nodes, back edges) into a forest of
//! owned [`ResourceModel`] trees. Nodes are claimed breadth first, so a
//! resource belongs to the parent nearest a root. Later references:
//!
//! - a single child that was already claimed: the relation key is dropped,
//!   its `<name>_url` link stays;
//! - a list member that was already claimed: it stays in the list as a
//!   metadata-only stub;
//! - a whole list instance that was already claimed: the key stays and
//!   every member is emitted as a stub.
//!
//! Unexpanded `<name>_url` links are fringe pointers and are left alone.

use super::graph::{ListId, NodeId, ResourceGraph, Resolved, Slot};
use super::model::{EntityValue, ResourceModel};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};

enum Draft {
    Value(Value),
    One(usize),
    Many(Vec<usize>),
}

struct DraftNode {
    source: NodeId,
    /// `None` until expanded; stays `None` for stubs
    entity: Option<BTreeMap<String, Draft>>,
}

#[derive(Default)]
struct Breaker {
    drafts: Vec<DraftNode>,
    visited_nodes: HashSet<NodeId>,
    visited_lists: HashSet<ListId>,
    queue: VecDeque<usize>,
}

impl Breaker {
    fn draft(&mut self, source: NodeId) -> usize {
        self.drafts.push(DraftNode {
            source,
            entity: None,
        });
        self.drafts.len() - 1
    }

    /// Claim `node` if unvisited and queue it for expansion
    fn claim(&mut self, node: NodeId) -> Option<usize> {
        if !self.visited_nodes.insert(node) {
            return None;
        }
        let idx = self.draft(node);
        self.queue.push_back(idx);
        Some(idx)
    }

    /// Claimed member, or a stub when it already has an owner
    fn claim_or_stub(&mut self, node: NodeId) -> usize {
        match self.claim(node) {
            Some(idx) => idx,
            None => self.draft(node),
        }
    }

    fn expand(&mut self, graph: &ResourceGraph, idx: usize) {
        let source = self.drafts[idx].source;
        let mut entity = BTreeMap::new();

        for (key, slot) in &graph.node(source).entity {
            let draft = match slot {
                Slot::Value(v) => Draft::Value(v.clone()),
                Slot::Node(child) => match self.claim(*child) {
                    Some(child_idx) => Draft::One(child_idx),
                    None => continue,
                },
                Slot::List(list) => {
                    let first_visit = self.visited_lists.insert(*list);
                    let members = graph
                        .list(*list)
                        .iter()
                        .map(|member| {
                            if first_visit {
                                self.claim_or_stub(*member)
                            } else {
                                self.draft(*member)
                            }
                        })
                        .collect();
                    Draft::Many(members)
                }
            };
            entity.insert(key.clone(), draft);
        }

        self.drafts[idx].entity = Some(entity);
    }

    fn assemble(&mut self, graph: &ResourceGraph, idx: usize) -> ResourceModel {
        let source = self.drafts[idx].source;
        let metadata: Map<String, Value> = graph.node(source).metadata.clone();
        let entity = self.drafts[idx].entity.take().map(|entity| {
            entity
                .into_iter()
                .map(|(key, draft)| {
                    let value = match draft {
                        Draft::Value(v) => EntityValue::Attribute(v),
                        Draft::One(child) => {
                            EntityValue::Resource(Box::new(self.assemble(graph, child)))
                        }
                        Draft::Many(members) => EntityValue::Resources(
                            members.into_iter().map(|m| self.assemble(graph, m)).collect(),
                        ),
                    };
                    (key, value)
                })
                .collect()
        });
        ResourceModel { metadata, entity }
    }
}

/// Break cycles below `roots`, returning one tree per root
///
/// A root that repeats an earlier root comes back as a stub.
pub fn break_cycles(graph: &ResourceGraph, roots: &[NodeId]) -> Vec<ResourceModel> {
    let mut breaker = Breaker::default();
    let root_drafts: Vec<usize> = roots.iter().map(|root| breaker.claim_or_stub(*root)).collect();

    while let Some(idx) = breaker.queue.pop_front() {
        breaker.expand(graph, idx);
    }

    root_drafts
        .into_iter()
        .map(|idx| breaker.assemble(graph, idx))
        .collect()
}

/// Break cycles below a resolved root (collection members or one resource)
pub fn break_resolved(graph: &ResourceGraph, root: Resolved) -> Vec<ResourceModel> {
    break_cycles(graph, &graph.members(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::model::RawResource;
    use serde_json::json;

    fn node(graph: &mut ResourceGraph, guid: &str) -> NodeId {
        let raw: RawResource = serde_json::from_value(json!({
            "metadata": {"guid": guid, "url": format!("/v2/things/{guid}")},
            "entity": {"name": guid}
        }))
        .unwrap();
        graph.add_resource(raw)
    }

    #[test]
    fn test_back_edge_is_removed() {
        let mut graph = ResourceGraph::new();
        let org = node(&mut graph, "o1");
        let space = node(&mut graph, "s1");
        let spaces = graph.add_list(vec![space]);
        graph.set_relation(org, "spaces", Slot::List(spaces));
        graph.set_relation(space, "organization", Slot::Node(org));

        let trees = break_cycles(&graph, &[org]);
        assert_eq!(trees.len(), 1);
        let space_tree = &trees[0].children("spaces").unwrap()[0];
        assert_eq!(space_tree.guid(), Some("s1"));
        assert!(space_tree.get("organization").is_none());
        assert_eq!(space_tree.attr("name"), Some(&json!("s1")));
    }

    #[test]
    fn test_shared_list_member_becomes_stub() {
        let mut graph = ResourceGraph::new();
        let org = node(&mut graph, "o1");
        let space = node(&mut graph, "s1");
        let user = node(&mut graph, "u1");
        let org_managers = graph.add_list(vec![user]);
        let space_managers = graph.add_list(vec![user]);
        let spaces = graph.add_list(vec![space]);
        graph.set_relation(org, "managers", Slot::List(org_managers));
        graph.set_relation(org, "spaces", Slot::List(spaces));
        graph.set_relation(space, "managers", Slot::List(space_managers));

        let trees = break_cycles(&graph, &[org]);
        let org_tree = &trees[0];
        assert!(!org_tree.children("managers").unwrap()[0].is_stub());
        let space_tree = &org_tree.children("spaces").unwrap()[0];
        let stub = &space_tree.children("managers").unwrap()[0];
        assert!(stub.is_stub());
        assert_eq!(stub.guid(), Some("u1"));
    }

    #[test]
    fn test_revisited_list_keeps_key_with_stubs() {
        let mut graph = ResourceGraph::new();
        let a = node(&mut graph, "a");
        let b = node(&mut graph, "b");
        let shared = node(&mut graph, "shared");
        let list = graph.add_list(vec![shared]);
        graph.set_relation(a, "items", Slot::List(list));
        graph.set_relation(b, "items", Slot::List(list));

        let trees = break_cycles(&graph, &[a, b]);
        assert!(!trees[0].children("items").unwrap()[0].is_stub());
        assert!(trees[1].children("items").unwrap()[0].is_stub());
    }

    #[test]
    fn test_self_loop_terminates() {
        let mut graph = ResourceGraph::new();
        let a = node(&mut graph, "a");
        graph.set_relation(a, "parent", Slot::Node(a));

        let trees = break_cycles(&graph, &[a]);
        assert!(trees[0].get("parent").is_none());
        assert!(serde_json::to_string(&trees).is_ok());
    }

    #[test]
    fn test_unexpanded_links_are_untouched() {
        let mut graph = ResourceGraph::new();
        let raw: RawResource = serde_json::from_value(json!({
            "metadata": {"guid": "d1", "url": "/v2/shared_domains/d1"},
            "entity": {"name": "example.com", "router_group_url": "/v2/router_groups/r"}
        }))
        .unwrap();
        let domain = graph.add_resource(raw);

        let trees = break_cycles(&graph, &[domain]);
        assert_eq!(
            trees[0].attr("router_group_url"),
            Some(&json!("/v2/router_groups/r"))
        );
    }

    #[test]
    fn test_duplicate_root_is_stub() {
        let mut graph = ResourceGraph::new();
        let a = node(&mut graph, "a");
        let trees = break_cycles(&graph, &[a, a]);
        assert!(!trees[0].is_stub());
        assert!(trees[1].is_stub());
    }
}
