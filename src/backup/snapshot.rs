//! Snapshot pipeline
//!
//! Walks each root in turn with its own cache, policy and depth bound,
//! breaks cycles and assembles the [`BackupEnvelope`]. Any fetch or parse
//! error aborts the whole snapshot.

use super::envelope::{BackupEnvelope, FeatureFlag};
use crate::cc::CcApi;
use crate::error::{BackupError, Result};
use crate::resource::fetcher;
use crate::resource::{break_resolved, Materializer, RelationPolicy, ResourceModel, TraversalRoot};
use serde_json::Value;

/// How one root is walked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub url: String,
    pub policy: RelationPolicy,
    pub max_depth: usize,
}

impl From<TraversalRoot> for RootSpec {
    fn from(root: TraversalRoot) -> Self {
        Self {
            url: root.url().to_string(),
            policy: root.policy(),
            max_depth: root.max_depth(),
        }
    }
}

/// Roots to capture, in order
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub roots: Vec<(TraversalRoot, RootSpec)>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            roots: TraversalRoot::ALL
                .iter()
                .map(|root| (*root, RootSpec::from(*root)))
                .collect(),
        }
    }
}

impl SnapshotConfig {
    /// Replace the walk parameters for one root
    pub fn with_root(mut self, root: TraversalRoot, spec: RootSpec) -> Self {
        match self.roots.iter_mut().find(|(r, _)| *r == root) {
            Some(entry) => entry.1 = spec,
            None => self.roots.push((root, spec)),
        }
        self
    }
}

/// Materialize and cycle-break one root
pub async fn snapshot_trees<A: CcApi>(api: &A, spec: &RootSpec) -> Result<Vec<ResourceModel>> {
    let mut materializer = Materializer::new(api, spec.policy.clone(), spec.max_depth);
    let resolved = materializer.materialize(&spec.url).await?;
    Ok(break_resolved(materializer.graph(), resolved))
}

/// Feature flags are a flat array with nothing to expand
pub async fn snapshot_feature_flags<A: CcApi>(api: &A, url: &str) -> Result<Vec<FeatureFlag>> {
    let raw = fetcher::fetch_json(api, url).await?;
    if !raw.is_array() {
        return Err(BackupError::parse(url, "feature flags are not an array"));
    }
    serde_json::from_value(raw).map_err(|e| BackupError::parse(url, format!("bad feature flag: {e}")))
}

/// Capture every configured root into one envelope
pub async fn snapshot<A: CcApi>(api: &A, config: &SnapshotConfig) -> Result<BackupEnvelope> {
    let mut envelope = BackupEnvelope::default();

    for (root, spec) in &config.roots {
        tracing::info!("Snapshotting {} from {}", root, spec.url);

        let value = match root {
            TraversalRoot::FeatureFlags => {
                let flags = snapshot_feature_flags(api, &spec.url).await?;
                tracing::info!("Captured {} feature flags", flags.len());
                serde_json::to_value(flags)?
            }
            _ => {
                let trees = snapshot_trees(api, spec).await?;
                tracing::info!("Captured {} {}", trees.len(), root);
                serde_json::to_value(trees)?
            }
        };

        *slot_for(&mut envelope, *root) = value;
    }

    Ok(envelope)
}

fn slot_for(envelope: &mut BackupEnvelope, root: TraversalRoot) -> &mut Value {
    match root {
        TraversalRoot::OrgQuotas => &mut envelope.org_quota_definitions,
        TraversalRoot::Organizations => &mut envelope.organizations,
        TraversalRoot::SharedDomains => &mut envelope.shared_domains,
        TraversalRoot::SecurityGroups => &mut envelope.security_groups,
        TraversalRoot::FeatureFlags => &mut envelope.feature_flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::mock::MockCcApi;
    use serde_json::json;

    fn empty() -> Value {
        json!({"total_results": 0, "total_pages": 0, "next_url": null, "resources": []})
    }

    #[tokio::test]
    async fn test_snapshot_fills_every_key() {
        let api = MockCcApi::new()
            .with_get_json("/v2/quota_definitions", &empty())
            .with_get_json("/v2/organizations", &empty())
            .with_get_json("/v2/shared_domains", &json!({"total_results": 1, "resources": [{
                "metadata": {"guid": "d1", "url": "/v2/shared_domains/d1"},
                "entity": {"name": "apps.example.com"}
            }]}))
            .with_get_json("/v2/security_groups", &empty())
            .with_get_json(
                "/v2/config/feature_flags",
                &json!([{"name": "diego_docker", "enabled": true, "url": "/v2/config/feature_flags/diego_docker"}]),
            );

        let envelope = snapshot(&api, &SnapshotConfig::default()).await.unwrap();
        assert_eq!(envelope.organizations, json!([]));
        assert_eq!(envelope.shared_domains[0]["entity"]["name"], "apps.example.com");
        assert_eq!(envelope.feature_flags[0]["name"], "diego_docker");
    }

    #[tokio::test]
    async fn test_failure_in_later_root_aborts() {
        let api = MockCcApi::new()
            .with_get_json("/v2/quota_definitions", &empty())
            .with_get_json("/v2/organizations", &empty());

        let err = snapshot(&api, &SnapshotConfig::default()).await.unwrap_err();
        assert!(matches!(err, BackupError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_feature_flags_must_be_an_array() {
        let api = MockCcApi::new().with_get_json("/v2/config/feature_flags", &empty());
        let err = snapshot_feature_flags(&api, "/v2/config/feature_flags")
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Parse { .. }));
    }

    #[test]
    fn test_with_root_overrides_depth() {
        let config = SnapshotConfig::default().with_root(
            TraversalRoot::Organizations,
            RootSpec {
                max_depth: 10,
                ..RootSpec::from(TraversalRoot::Organizations)
            },
        );
        let (_, spec) = config
            .roots
            .iter()
            .find(|(r, _)| *r == TraversalRoot::Organizations)
            .unwrap();
        assert_eq!(spec.max_depth, 10);
        assert_eq!(config.roots.len(), 5);
    }
}
