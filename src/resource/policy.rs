//! Relation policies and traversal roots
//!
//! A policy is the closed set of relation names that may be expanded while
//! walking from one root. Anything outside it stays a bare `<name>_url`.

use std::collections::BTreeSet;
use std::fmt;

/// Relations expanded below `/v2/organizations`
pub const ORGANIZATION_RELATIONS: &[&str] = &[
    "auditors",
    "managers",
    "billing_managers",
    "developers",
    "quota_definition",
    "spaces",
    "space_quota_definitions",
    "apps",
    "stack",
    "routes",
    "route_mappings",
    "domains",
    "private_domains",
];

/// Relations expanded below `/v2/security_groups`
pub const SECURITY_GROUP_RELATIONS: &[&str] = &["spaces", "organization"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationPolicy {
    allowed: BTreeSet<String>,
}

impl RelationPolicy {
    /// Follows nothing
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_names(names: &[&str]) -> Self {
        Self {
            allowed: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn follow(&self, relation: &str) -> bool {
        self.allowed.contains(relation)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// Top-level collections captured in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraversalRoot {
    OrgQuotas,
    Organizations,
    SharedDomains,
    SecurityGroups,
    FeatureFlags,
}

impl TraversalRoot {
    /// Snapshot order
    pub const ALL: [TraversalRoot; 5] = [
        TraversalRoot::OrgQuotas,
        TraversalRoot::Organizations,
        TraversalRoot::SharedDomains,
        TraversalRoot::SecurityGroups,
        TraversalRoot::FeatureFlags,
    ];

    pub fn url(self) -> &'static str {
        match self {
            TraversalRoot::OrgQuotas => "/v2/quota_definitions",
            TraversalRoot::Organizations => "/v2/organizations",
            TraversalRoot::SharedDomains => "/v2/shared_domains",
            TraversalRoot::SecurityGroups => "/v2/security_groups",
            TraversalRoot::FeatureFlags => "/v2/config/feature_flags",
        }
    }

    pub fn policy(self) -> RelationPolicy {
        match self {
            TraversalRoot::Organizations => RelationPolicy::from_names(ORGANIZATION_RELATIONS),
            TraversalRoot::SecurityGroups => RelationPolicy::from_names(SECURITY_GROUP_RELATIONS),
            TraversalRoot::OrgQuotas | TraversalRoot::SharedDomains | TraversalRoot::FeatureFlags => {
                RelationPolicy::none()
            }
        }
    }

    /// Maximum number of relation hops expanded from the root's members
    pub fn max_depth(self) -> usize {
        match self {
            // org -> spaces -> apps -> routes -> route_mappings/domains
            TraversalRoot::Organizations => 5,
            TraversalRoot::SecurityGroups => 2,
            TraversalRoot::OrgQuotas | TraversalRoot::SharedDomains => 1,
            TraversalRoot::FeatureFlags => 0,
        }
    }

    /// Key of this root in the snapshot document
    pub fn envelope_key(self) -> &'static str {
        match self {
            TraversalRoot::OrgQuotas => "org_quota_definitions",
            TraversalRoot::Organizations => "organizations",
            TraversalRoot::SharedDomains => "shared_domains",
            TraversalRoot::SecurityGroups => "security_groups",
            TraversalRoot::FeatureFlags => "feature_flags",
        }
    }
}

impl fmt::Display for TraversalRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.envelope_key())
    }
}
