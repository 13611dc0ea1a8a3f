//! Restore replay
//!
//! Re-materializes a persisted snapshot into a [`ResourceGraph`] without
//! touching the network. Identity comes back from repeated URLs inside the
//! document: a stub occurrence and the full occurrence of the same URL become
//! one node, and `<name>_url` links whose expanded sibling the cycle breaker
//! removed are re-linked to the instance found elsewhere in the document.

use super::envelope::{BackupEnvelope, FeatureFlag};
use crate::error::{BackupError, Result};
use crate::resource::json;
use crate::resource::{
    FetchCache, NodeId, RelationPolicy, ResourceGraph, Resolved, Slot, TraversalRoot, URL_SUFFIX,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct Replay {
    graph: ResourceGraph,
    cache: FetchCache,
    roots: BTreeMap<TraversalRoot, Vec<NodeId>>,
    /// Root a node was first seen under; its policy governs re-linking
    origin: HashMap<NodeId, TraversalRoot>,
    by_guid: HashMap<String, NodeId>,
    flags: Vec<FeatureFlag>,
}

impl Replay {
    pub fn from_envelope(envelope: &BackupEnvelope) -> Result<Self> {
        let mut replay = Replay::default();

        for root in TraversalRoot::ALL {
            let value = match root {
                TraversalRoot::FeatureFlags => {
                    replay.flags = envelope.feature_flags()?;
                    continue;
                }
                TraversalRoot::OrgQuotas => &envelope.org_quota_definitions,
                TraversalRoot::Organizations => &envelope.organizations,
                TraversalRoot::SharedDomains => &envelope.shared_domains,
                TraversalRoot::SecurityGroups => &envelope.security_groups,
            };
            let ids = replay.ingest_root(value, root)?;
            tracing::debug!("Replayed {} {}", ids.len(), root);
            replay.roots.insert(root, ids);
        }

        replay.relink();
        Ok(replay)
    }

    fn ingest_root(&mut self, value: &Value, root: TraversalRoot) -> Result<Vec<NodeId>> {
        let policy = root.policy();
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .iter()
                .map(|item| self.ingest_resource(item, root, &policy))
                .collect(),
            _ => Err(BackupError::parse(root.envelope_key(), "expected a list of resources")),
        }
    }

    fn ingest_resource(
        &mut self,
        value: &Value,
        root: TraversalRoot,
        policy: &RelationPolicy,
    ) -> Result<NodeId> {
        let path = root.envelope_key();
        let resource = json::as_object(value, path, "resource")?;
        let metadata = json::get_object(resource, "metadata", path)?;
        let url = json::get_str(metadata, "url", path)?;

        let id = match self.cache.single(url) {
            Some(id) => id,
            None => {
                let id = self.graph.add_stub(metadata.clone());
                self.cache.insert(url, Resolved::Single(id));
                if let Some(guid) = json::opt_str(metadata, "guid") {
                    self.by_guid.entry(guid.to_string()).or_insert(id);
                }
                self.origin.insert(id, root);
                id
            }
        };

        let entity = match resource.get("entity") {
            None | Some(Value::Null) => return Ok(id),
            Some(v) => json::as_object(v, path, "entity")?,
        };

        let mut slots = BTreeMap::new();
        for (key, value) in entity {
            let slot = match relation_link(entity, key, value, policy) {
                Some(link) => self.ingest_relation(value, link, root, policy)?,
                None => Slot::Value(value.clone()),
            };
            slots.insert(key.clone(), slot);
        }

        // first full occurrence wins, later ones only add keys
        let node = self.graph.node_mut(id);
        if node.stub {
            node.entity = slots;
            node.stub = false;
        } else {
            for (key, slot) in slots {
                node.entity.entry(key).or_insert(slot);
            }
        }

        Ok(id)
    }

    fn ingest_relation(
        &mut self,
        value: &Value,
        link: &str,
        root: TraversalRoot,
        policy: &RelationPolicy,
    ) -> Result<Slot> {
        match value {
            Value::Array(items) => {
                let members = items
                    .iter()
                    .map(|item| self.ingest_resource(item, root, policy))
                    .collect::<Result<Vec<_>>>()?;
                let graph = &mut self.graph;
                let resolved = self
                    .cache
                    .get_or_insert_with(link, || Resolved::Collection(graph.add_list(members)));
                Ok(resolved.into())
            }
            _ => Ok(Slot::Node(self.ingest_resource(value, root, policy)?)),
        }
    }

    /// Restore links dropped by the cycle breaker
    fn relink(&mut self) {
        let policies: BTreeMap<TraversalRoot, RelationPolicy> = TraversalRoot::ALL
            .iter()
            .map(|root| (*root, root.policy()))
            .collect();

        let mut relinked = 0;
        for id in self.graph.node_ids().collect::<Vec<_>>() {
            let Some(policy) = self.origin.get(&id).and_then(|root| policies.get(root)) else {
                continue;
            };
            for (relation, url) in self.graph.pending_relations(id) {
                if !policy.follow(&relation) {
                    continue;
                }
                if let Some(resolved) = self.cache.get(&url) {
                    self.graph.set_relation(id, &relation, resolved.into());
                    relinked += 1;
                }
            }
        }
        tracing::debug!("Re-linked {} relations", relinked);
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn roots(&self, root: TraversalRoot) -> &[NodeId] {
        self.roots.get(&root).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn feature_flags(&self) -> &[FeatureFlag] {
        &self.flags
    }

    pub fn find_by_guid(&self, guid: &str) -> Option<NodeId> {
        self.by_guid.get(guid).copied()
    }

    pub fn find_by_url(&self, url: &str) -> Option<NodeId> {
        self.cache.single(url)
    }

    /// Display name: `name`, else `username`, else the guid
    pub fn display_name(&self, id: NodeId) -> String {
        let graph = &self.graph;
        graph
            .attr_str(id, "name")
            .or_else(|| graph.attr_str(id, "username"))
            .or_else(|| graph.guid(id))
            .unwrap_or("-")
            .to_string()
    }
}

/// The `<key>_url` link if `key` holds an expanded relation under `policy`
///
/// Object and array values without a sibling link (rules,
/// environment_json, ...) are plain attributes.
fn relation_link<'a>(
    entity: &'a Map<String, Value>,
    key: &str,
    value: &Value,
    policy: &RelationPolicy,
) -> Option<&'a str> {
    if !(value.is_object() || value.is_array()) || !policy.follow(key) {
        return None;
    }
    json::opt_str(entity, &format!("{key}{URL_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(kind: &str, guid: &str) -> Value {
        json!({"guid": guid, "url": format!("/v2/{kind}/{guid}")})
    }

    #[test]
    fn test_stub_is_backfilled_from_full_occurrence() {
        let envelope = BackupEnvelope {
            organizations: json!([{
                "metadata": meta("organizations", "o1"),
                "entity": {
                    "name": "o1",
                    "managers_url": "/v2/organizations/o1/managers",
                    "managers": [{"metadata": meta("users", "u1"), "entity": {"username": "alice"}}],
                    "spaces_url": "/v2/organizations/o1/spaces",
                    "spaces": [{
                        "metadata": meta("spaces", "s1"),
                        "entity": {
                            "name": "s1",
                            "managers_url": "/v2/spaces/s1/managers",
                            "managers": [{"metadata": meta("users", "u1")}]
                        }
                    }]
                }
            }]),
            ..Default::default()
        };

        let replay = Replay::from_envelope(&envelope).unwrap();
        let graph = replay.graph();
        let org = replay.roots(TraversalRoot::Organizations)[0];
        let space = graph.children(org, "spaces")[0];
        let org_manager = graph.children(org, "managers")[0];
        let space_manager = graph.children(space, "managers")[0];

        assert_eq!(org_manager, space_manager);
        assert!(!graph.node(space_manager).stub);
        assert_eq!(graph.attr_str(space_manager, "username"), Some("alice"));
    }

    #[test]
    fn test_removed_single_relation_is_relinked() {
        let stack = json!({"metadata": meta("stacks", "st1"), "entity": {"name": "cflinuxfs4"}});
        let envelope = BackupEnvelope {
            organizations: json!([{
                "metadata": meta("organizations", "o1"),
                "entity": {
                    "name": "o1",
                    "spaces_url": "/v2/organizations/o1/spaces",
                    "spaces": [{
                        "metadata": meta("spaces", "s1"),
                        "entity": {
                            "name": "s1",
                            "apps_url": "/v2/spaces/s1/apps",
                            "apps": [
                                {"metadata": meta("apps", "a1"),
                                 "entity": {"name": "a1", "stack_url": "/v2/stacks/st1", "stack": stack}},
                                {"metadata": meta("apps", "a2"),
                                 "entity": {"name": "a2", "stack_url": "/v2/stacks/st1"}}
                            ]
                        }
                    }]
                }
            }]),
            ..Default::default()
        };

        let replay = Replay::from_envelope(&envelope).unwrap();
        let a1 = replay.find_by_guid("a1").unwrap();
        let a2 = replay.find_by_guid("a2").unwrap();
        let graph = replay.graph();

        assert!(graph.child(a2, "stack").is_some());
        assert_eq!(graph.child(a1, "stack"), graph.child(a2, "stack"));
    }

    #[test]
    fn test_object_attributes_are_not_relations() {
        let envelope = BackupEnvelope {
            security_groups: json!([{
                "metadata": meta("security_groups", "sg1"),
                "entity": {
                    "name": "public",
                    "rules": [{"protocol": "all", "destination": "0.0.0.0/0"}],
                    "spaces_url": "/v2/security_groups/sg1/spaces",
                    "spaces": []
                }
            }]),
            ..Default::default()
        };

        let replay = Replay::from_envelope(&envelope).unwrap();
        let sg = replay.roots(TraversalRoot::SecurityGroups)[0];
        let graph = replay.graph();
        assert!(graph.attr(sg, "rules").unwrap().is_array());
        assert!(graph.children(sg, "spaces").is_empty());
    }

    #[test]
    fn test_resource_without_metadata_is_a_parse_error() {
        let envelope = BackupEnvelope {
            shared_domains: json!([{"entity": {"name": "example.com"}}]),
            ..Default::default()
        };
        let err = Replay::from_envelope(&envelope).unwrap_err();
        assert!(matches!(err, BackupError::Parse { .. }));
    }
}
