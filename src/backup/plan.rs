//! Restore ordering
//!
//! Lays the replayed graph out as a dependency-ordered list of steps. Each
//! step names the owner whose freshly issued guid it needs; the restore
//! driver skips a step when its owner could not be restored.

use super::replay::Replay;
use crate::resource::{NodeId, TraversalRoot};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrgRole {
    Auditor,
    BillingManager,
    Manager,
}

impl OrgRole {
    pub const ALL: [OrgRole; 3] = [OrgRole::Auditor, OrgRole::BillingManager, OrgRole::Manager];

    /// Relation holding the users with this role
    pub fn relation(self) -> &'static str {
        match self {
            OrgRole::Auditor => "auditors",
            OrgRole::BillingManager => "billing_managers",
            OrgRole::Manager => "managers",
        }
    }

    /// Association path segment under `/v2/users/:guid/`
    pub fn association(self) -> &'static str {
        match self {
            OrgRole::Auditor => "audited_organizations",
            OrgRole::BillingManager => "billing_managed_organizations",
            OrgRole::Manager => "managed_organizations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceRole {
    Auditor,
    Developer,
    Manager,
}

impl SpaceRole {
    pub const ALL: [SpaceRole; 3] = [SpaceRole::Auditor, SpaceRole::Developer, SpaceRole::Manager];

    pub fn relation(self) -> &'static str {
        match self {
            SpaceRole::Auditor => "auditors",
            SpaceRole::Developer => "developers",
            SpaceRole::Manager => "managers",
        }
    }

    pub fn association(self) -> &'static str {
        match self {
            SpaceRole::Auditor => "audited_spaces",
            SpaceRole::Developer => "spaces",
            SpaceRole::Manager => "managed_spaces",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    SharedDomain,
    FeatureFlag,
    OrgQuota,
    Organization,
    OrgRole(OrgRole),
    PrivateDomain,
    SpaceQuota,
    Space,
    SpaceRole(SpaceRole),
    App,
    Route,
    SecurityGroup,
}

impl ResourceKind {
    /// Whether the step issues a new guid (as opposed to an association)
    pub fn creates_resource(self) -> bool {
        !matches!(
            self,
            ResourceKind::FeatureFlag | ResourceKind::OrgRole(_) | ResourceKind::SpaceRole(_)
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::SharedDomain => f.write_str("shared domain"),
            ResourceKind::FeatureFlag => f.write_str("feature flag"),
            ResourceKind::OrgQuota => f.write_str("quota"),
            ResourceKind::Organization => f.write_str("organization"),
            ResourceKind::OrgRole(role) => write!(f, "organization {}", role.relation()),
            ResourceKind::PrivateDomain => f.write_str("private domain"),
            ResourceKind::SpaceQuota => f.write_str("space quota"),
            ResourceKind::Space => f.write_str("space"),
            ResourceKind::SpaceRole(role) => write!(f, "space {}", role.relation()),
            ResourceKind::App => f.write_str("application"),
            ResourceKind::Route => f.write_str("route"),
            ResourceKind::SecurityGroup => f.write_str("security group"),
        }
    }
}

/// What a step restores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Node(NodeId),
    /// Index into [`Replay::feature_flags`]
    Flag(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreStep {
    pub kind: ResourceKind,
    pub subject: Subject,
    /// Resource whose new guid this step attaches to
    pub owner: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    pub include_security_groups: bool,
    pub include_quota_definitions: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RestorePlan {
    steps: Vec<RestoreStep>,
}

impl RestorePlan {
    /// Order: shared domains, feature flags, quotas, organizations, org roles,
    /// private domains, space quotas, spaces, space roles, apps, routes,
    /// security groups.
    pub fn build(replay: &Replay, options: &RestoreOptions) -> Self {
        let graph = replay.graph();
        let mut plan = RestorePlan::default();
        let orgs = replay.roots(TraversalRoot::Organizations);

        for domain in replay.roots(TraversalRoot::SharedDomains) {
            plan.push(ResourceKind::SharedDomain, *domain, None);
        }

        for index in 0..replay.feature_flags().len() {
            plan.steps.push(RestoreStep {
                kind: ResourceKind::FeatureFlag,
                subject: Subject::Flag(index),
                owner: None,
            });
        }

        if options.include_quota_definitions {
            for quota in replay.roots(TraversalRoot::OrgQuotas) {
                plan.push(ResourceKind::OrgQuota, *quota, None);
            }
        }

        for org in orgs {
            plan.push(ResourceKind::Organization, *org, None);
        }

        for org in orgs {
            for role in OrgRole::ALL {
                for user in graph.children(*org, role.relation()) {
                    plan.push(ResourceKind::OrgRole(role), *user, Some(*org));
                }
            }
        }

        for org in orgs {
            for domain in graph.children(*org, "private_domains") {
                plan.push(ResourceKind::PrivateDomain, *domain, Some(*org));
            }
        }

        if options.include_quota_definitions {
            for org in orgs {
                for quota in graph.children(*org, "space_quota_definitions") {
                    plan.push(ResourceKind::SpaceQuota, *quota, Some(*org));
                }
            }
        }

        let spaces: Vec<NodeId> = orgs
            .iter()
            .flat_map(|org| graph.children(*org, "spaces").iter().map(move |s| (*org, *s)))
            .map(|(org, space)| {
                plan.push(ResourceKind::Space, space, Some(org));
                space
            })
            .collect();

        for space in &spaces {
            for role in SpaceRole::ALL {
                for user in graph.children(*space, role.relation()) {
                    plan.push(ResourceKind::SpaceRole(role), *user, Some(*space));
                }
            }
        }

        let apps: Vec<NodeId> = spaces
            .iter()
            .flat_map(|space| graph.children(*space, "apps").iter().map(move |a| (*space, *a)))
            .map(|(space, app)| {
                plan.push(ResourceKind::App, app, Some(space));
                app
            })
            .collect();

        for app in &apps {
            for route in graph.children(*app, "routes") {
                plan.push(ResourceKind::Route, *route, Some(*app));
            }
        }

        if options.include_security_groups {
            for group in replay.roots(TraversalRoot::SecurityGroups) {
                plan.push(ResourceKind::SecurityGroup, *group, None);
            }
        }

        plan
    }

    fn push(&mut self, kind: ResourceKind, node: NodeId, owner: Option<NodeId>) {
        self.steps.push(RestoreStep {
            kind,
            subject: Subject::Node(node),
            owner,
        });
    }

    pub fn steps(&self) -> &[RestoreStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
