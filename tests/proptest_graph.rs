//! Property-based tests using proptest
//!
//! These tests verify the cycle breaker and the materializer bounds on
//! randomly shaped resource graphs.

use cfbackup::cc::mock::MockCcApi;
use cfbackup::resource::{
    break_cycles, break_resolved, EntityValue, Materializer, NodeId, RawResource, RelationPolicy,
    ResourceGraph, ResourceModel, Slot,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};

/// One relation edge: (from, relation index, is list, targets)
type Edge = (usize, usize, bool, Vec<usize>);

/// Generate a node count and random edges between those nodes
fn arb_graph() -> impl Strategy<Value = (usize, Vec<Edge>)> {
    (1usize..12).prop_flat_map(|n| {
        let edge = (
            0..n,
            0usize..4,
            any::<bool>(),
            prop::collection::vec(0..n, 1..4),
        );
        (Just(n), prop::collection::vec(edge, 0..24))
    })
}

fn resource(i: usize, entity: Value) -> Value {
    json!({"metadata": {"guid": format!("g{i}"), "url": format!("/v2/things/{i}")}, "entity": entity})
}

fn build_graph(n: usize, edges: &[Edge]) -> ResourceGraph {
    let mut graph = ResourceGraph::new();
    let ids: Vec<NodeId> = (0..n)
        .map(|i| {
            let raw: RawResource = serde_json::from_value(resource(i, json!({"name": format!("n{i}")}))).unwrap();
            graph.add_resource(raw)
        })
        .collect();

    for (from, rel, is_list, targets) in edges {
        let slot = if *is_list {
            Slot::List(graph.add_list(targets.iter().map(|t| ids[*t]).collect()))
        } else {
            Slot::Node(ids[targets[0]])
        };
        graph.set_relation(ids[*from], &format!("r{rel}"), slot);
    }
    graph
}

fn reachable(graph: &ResourceGraph, roots: &[NodeId]) -> HashSet<NodeId> {
    let mut seen: HashSet<NodeId> = roots.iter().copied().collect();
    let mut queue: VecDeque<NodeId> = roots.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        for slot in graph.node(id).entity.values() {
            let next = match slot {
                Slot::Node(child) => vec![*child],
                Slot::List(list) => graph.list(*list).to_vec(),
                Slot::Value(_) => Vec::new(),
            };
            for child in next {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
    }
    seen
}

fn full_guids(trees: &[ResourceModel]) -> Vec<String> {
    let mut out = Vec::new();
    for tree in trees {
        tree.walk(&mut |node| {
            if !node.is_stub() {
                out.push(node.guid().unwrap_or_default().to_string());
            }
        });
    }
    out
}

fn tree_depth(model: &ResourceModel) -> usize {
    let Some(entity) = &model.entity else {
        return 0;
    };
    entity
        .values()
        .map(|value| match value {
            EntityValue::Resource(child) => 1 + tree_depth(child),
            EntityValue::Resources(list) => 1 + list.iter().map(tree_depth).max().unwrap_or(0),
            EntityValue::Attribute(_) => 0,
        })
        .max()
        .unwrap_or(0)
}

/// Serve the random graph as a scripted installation
///
/// Node `i` links relation `r<k>` to `/v2/things/<j>` (single) or to
/// `/v2/things/<i>/r<k>` (collection), and always carries an `x_url`
/// link outside the policy.
fn serve(n: usize, roots: usize, edges: &[Edge]) -> MockCcApi {
    let mut links: HashMap<usize, serde_json::Map<String, Value>> = (0..n)
        .map(|i| {
            let mut entity = serde_json::Map::new();
            entity.insert("name".to_string(), json!(format!("n{i}")));
            entity.insert("x_url".to_string(), json!(format!("/v2/things/{i}/x")));
            (i, entity)
        })
        .collect();
    let mut collections = Vec::new();

    for (from, rel, is_list, targets) in edges {
        let key = format!("r{rel}_url");
        let entity = links.entry(*from).or_default();
        if entity.contains_key(&key) {
            continue;
        }
        if *is_list {
            let url = format!("/v2/things/{from}/r{rel}");
            entity.insert(key, json!(url));
            collections.push((url, targets.clone()));
        } else {
            entity.insert(key, json!(format!("/v2/things/{}", targets[0])));
        }
    }

    let full = |i: usize| resource(i, Value::Object(links[&i].clone()));
    let listing = |members: Vec<Value>| {
        json!({"total_results": members.len(), "next_url": null, "resources": members})
    };

    let mut api = MockCcApi::new().with_get_json("/v2/things", &listing((0..roots).map(full).collect()));
    for i in 0..n {
        api = api.with_get_json(&format!("/v2/things/{i}"), &full(i));
    }
    for (url, targets) in collections {
        api = api.with_get_json(&url, &listing(targets.into_iter().map(full).collect()));
    }
    api
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every reachable node is emitted in full exactly once
    #[test]
    fn prop_breaker_single_ownership((n, edges) in arb_graph(), root_count in 1usize..4) {
        let graph = build_graph(n, &edges);
        let roots: Vec<NodeId> = graph.node_ids().take(root_count.min(n)).collect();

        let trees = break_cycles(&graph, &roots);
        let full = full_guids(&trees);
        let unique: HashSet<&String> = full.iter().collect();

        prop_assert_eq!(trees.len(), roots.len());
        prop_assert_eq!(unique.len(), full.len());
        prop_assert_eq!(full.len(), reachable(&graph, &roots).len());
    }

    /// The broken forest always serializes
    #[test]
    fn prop_breaker_output_serializes((n, edges) in arb_graph()) {
        let graph = build_graph(n, &edges);
        let roots: Vec<NodeId> = graph.node_ids().collect();

        let trees = break_cycles(&graph, &roots);
        let text = serde_json::to_string(&trees);

        prop_assert!(text.is_ok());
    }

    /// Materialized trees respect depth, policy and the one-fetch rule
    #[test]
    fn prop_materializer_bounds((n, edges) in arb_graph(), roots in 1usize..4, max_depth in 0usize..5) {
        let roots = roots.min(n);
        let api = serve(n, roots, &edges);
        let policy = RelationPolicy::from_names(&["r0", "r1", "r2", "r3"]);

        let trees = tokio_test::block_on(async {
            let mut materializer = Materializer::new(&api, policy, max_depth);
            let root = materializer.materialize("/v2/things").await.unwrap();
            break_resolved(materializer.graph(), root)
        });

        prop_assert_eq!(trees.len(), roots);
        for tree in &trees {
            prop_assert!(tree_depth(tree) <= max_depth);
        }
        for i in 0..n {
            let item_calls = api.calls(&format!("/v2/things/{i}"));
            prop_assert!(item_calls <= 1);
            prop_assert_eq!(api.calls(&format!("/v2/things/{i}/x")), 0);
        }
        prop_assert_eq!(api.calls("/v2/things"), 1);
    }
}
