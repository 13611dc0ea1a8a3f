//! Snapshot outline for the `info` command

use super::replay::Replay;
use crate::resource::TraversalRoot;

/// Organization / space / app outline followed by per-root counts
pub fn summarize(replay: &Replay) -> Vec<String> {
    let graph = replay.graph();
    let orgs = replay.roots(TraversalRoot::Organizations);
    let mut lines = Vec::new();

    if orgs.is_empty() {
        lines.push("No organizations backed up.".to_string());
    }
    for org in orgs {
        lines.push(format!("- Org {}", replay.display_name(*org)));
        for space in graph.children(*org, "spaces") {
            lines.push(format!("-- Space {}", replay.display_name(*space)));
            for app in graph.children(*space, "apps") {
                lines.push(format!("--- App {}", replay.display_name(*app)));
            }
        }
    }

    for root in [
        TraversalRoot::OrgQuotas,
        TraversalRoot::SharedDomains,
        TraversalRoot::SecurityGroups,
    ] {
        lines.push(format!("{}: {}", root, replay.roots(root).len()));
    }
    lines.push(format!(
        "{}: {}",
        TraversalRoot::FeatureFlags,
        replay.feature_flags().len()
    ));

    lines
}
