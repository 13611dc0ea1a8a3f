//! Restore driver
//!
//! Walks a [`RestorePlan`] in order, substitutes freshly issued guids for the
//! snapshot's and hands each resolved entity to a [`ResourceCreator`].
//! Failures are logged and counted; they never stop the run. Steps whose
//! owner could not be restored are skipped.

use super::envelope::FeatureFlag;
use super::plan::{ResourceKind, RestorePlan, RestoreStep, Subject};
use super::replay::Replay;
use crate::error::Result;
use crate::resource::{NodeId, Slot};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Suffix of identifier attributes rewritten during restore
const GUID_SUFFIX: &str = "_guid";

/// An entity ready to be created on the target
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    pub kind: ResourceKind,
    /// Guid in the snapshot; feature flags have none
    pub old_guid: Option<String>,
    pub name: String,
    /// New guid of the owner (org, space or app)
    pub owner_guid: Option<String>,
    /// New guid, when an earlier step already restored this resource
    pub existing_guid: Option<String>,
    /// Plain attributes; `*_guid` values rewritten to new guids, unknown ones dropped
    pub attributes: Map<String, Value>,
    /// Extra facts the creator needs (stack name, domain name, ...)
    pub hints: Map<String, Value>,
}

/// Creates one entity on the target installation
#[allow(async_fn_in_trait)]
pub trait ResourceCreator {
    /// Returns the new guid for created resources, `None` for associations
    async fn create(&mut self, entity: &ResolvedEntity) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub created: usize,
    pub associated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Old guid to new guid
#[derive(Debug, Clone, Default)]
pub struct GuidMap {
    inner: HashMap<String, String>,
}

impl GuidMap {
    pub fn get(&self, old: &str) -> Option<&str> {
        self.inner.get(old).map(String::as_str)
    }

    pub fn insert(&mut self, old: &str, new: &str) {
        self.inner.insert(old.to_string(), new.to_string());
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

pub async fn restore<C: ResourceCreator>(
    replay: &Replay,
    plan: &RestorePlan,
    creator: &mut C,
) -> (RestoreReport, GuidMap) {
    let mut report = RestoreReport::default();
    let mut guids = GuidMap::default();
    let total = plan.len();

    for (index, step) in plan.steps().iter().enumerate() {
        let Some(entity) = resolve_step(replay, step, &guids) else {
            report.skipped += 1;
            continue;
        };

        tracing::info!("Restoring {} {} [{}/{}]", entity.kind, entity.name, index + 1, total);

        match creator.create(&entity).await {
            Ok(Some(new_guid)) => {
                if let Some(old) = &entity.old_guid {
                    guids.insert(old, &new_guid);
                }
                report.created += 1;
                tracing::info!("Successfully restored {} {}", entity.kind, entity.name);
            }
            Ok(None) => {
                report.associated += 1;
            }
            Err(err) => {
                report.failed += 1;
                tracing::warn!("Error restoring {} {}: {}", entity.kind, entity.name, err);
            }
        }
    }

    tracing::info!(
        "Restore finished: {} created, {} associated, {} failed, {} skipped",
        report.created,
        report.associated,
        report.failed,
        report.skipped
    );

    (report, guids)
}

/// Build the entity for `step`, or `None` when its owner is missing
pub fn resolve_step(replay: &Replay, step: &RestoreStep, guids: &GuidMap) -> Option<ResolvedEntity> {
    let node = match step.subject {
        Subject::Flag(index) => {
            let flag = replay.feature_flags().get(index)?;
            return Some(resolve_flag(flag));
        }
        Subject::Node(node) => node,
    };
    let graph = replay.graph();

    let owner_guid = match step.owner {
        Some(owner) => {
            let resolved = graph.guid(owner).and_then(|old| guids.get(old));
            let Some(new) = resolved else {
                tracing::warn!(
                    "Skipping {} {}: {} was not restored",
                    step.kind,
                    replay.display_name(node),
                    replay.display_name(owner)
                );
                return None;
            };
            Some(new.to_string())
        }
        None => None,
    };

    let old_guid = graph.guid(node).map(str::to_string);
    let existing_guid = old_guid
        .as_deref()
        .filter(|_| step.kind.creates_resource())
        .and_then(|old| guids.get(old))
        .map(str::to_string);

    let name = match step.kind {
        ResourceKind::Route => graph.attr_str(node, "host").unwrap_or_default().to_string(),
        _ => replay.display_name(node),
    };

    Some(ResolvedEntity {
        kind: step.kind,
        old_guid,
        name,
        owner_guid,
        existing_guid,
        attributes: substituted_attributes(replay, node, guids),
        hints: hints_for(replay, step.kind, node, guids),
    })
}

fn resolve_flag(flag: &FeatureFlag) -> ResolvedEntity {
    let mut attributes = Map::new();
    attributes.insert("enabled".to_string(), Value::Bool(flag.enabled));
    if let Some(message) = &flag.error_message {
        attributes.insert("error_message".to_string(), Value::String(message.clone()));
    }
    ResolvedEntity {
        kind: ResourceKind::FeatureFlag,
        old_guid: None,
        name: flag.name.clone(),
        owner_guid: None,
        existing_guid: None,
        attributes,
        hints: Map::new(),
    }
}

/// Plain attributes with identifiers swapped for restored ones
///
/// A `*_guid` attribute pointing at a resource that was not restored is
/// dropped, so the target applies its default (e.g. the default quota).
fn substituted_attributes(replay: &Replay, node: NodeId, guids: &GuidMap) -> Map<String, Value> {
    let mut attributes = Map::new();
    for (key, slot) in &replay.graph().node(node).entity {
        let Slot::Value(value) = slot else {
            continue;
        };
        if key.ends_with(GUID_SUFFIX) {
            if let Some(new) = value.as_str().and_then(|old| guids.get(old)) {
                attributes.insert(key.clone(), Value::String(new.to_string()));
            }
            continue;
        }
        attributes.insert(key.clone(), value.clone());
    }
    attributes
}

fn hints_for(replay: &Replay, kind: ResourceKind, node: NodeId, guids: &GuidMap) -> Map<String, Value> {
    let graph = replay.graph();
    let mut hints = Map::new();

    match kind {
        ResourceKind::App => {
            let stack_name = graph
                .child(node, "stack")
                .and_then(|stack| graph.attr_str(stack, "name"));
            if let Some(name) = stack_name {
                hints.insert("stack_name".to_string(), Value::String(name.to_string()));
            }
        }
        ResourceKind::Route => {
            let domain = graph
                .attr_str(node, "domain_guid")
                .and_then(|guid| replay.find_by_guid(guid));
            if let Some(domain) = domain {
                if let Some(name) = graph.attr_str(domain, "name") {
                    hints.insert("domain_name".to_string(), Value::String(name.to_string()));
                }
                let shared = graph
                    .attr(domain, "owning_organization_guid")
                    .map_or(true, Value::is_null);
                hints.insert("domain_shared".to_string(), Value::Bool(shared));
            }
        }
        ResourceKind::SecurityGroup => {
            let mut space_guids = Vec::new();
            for space in graph.children(node, "spaces") {
                match graph.guid(*space).and_then(|old| guids.get(old)) {
                    Some(new) => space_guids.push(Value::String(new.to_string())),
                    None => tracing::warn!(
                        "Security group {} loses space {}: it was not restored",
                        replay.display_name(node),
                        replay.display_name(*space)
                    ),
                }
            }
            hints.insert("space_guids".to_string(), Value::Array(space_guids));
        }
        _ => {}
    }

    hints
}
