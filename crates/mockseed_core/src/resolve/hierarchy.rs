//! Cycle repair for container parent chains.

use crate::identity::EntityId;
use crate::model::graph::Container;
use crate::model::reference::Ref;
use crate::report::{Recovery, RunReport};
use std::collections::{HashMap, HashSet};

/// Rewrites every parent edge that closes a cycle to `root`.
///
/// Containers are visited in order, so the earliest edge of a cycle is the
/// one rewritten. When `root` itself would close a cycle (or is absent) the
/// parent is cleared.
pub fn break_cycles(containers: &mut [Container], root: Option<EntityId>, report: &mut RunReport) {
    let mut edges: HashMap<EntityId, Option<EntityId>> = containers
        .iter()
        .map(|container| (container.id, parent_id(container)))
        .collect();

    for container in containers.iter_mut() {
        let Some(candidate) = parent_id(container) else {
            continue;
        };
        if !would_create_cycle(container.id, candidate, &edges) {
            continue;
        }

        let replacement =
            root.filter(|root_id| !would_create_cycle(container.id, *root_id, &edges));
        container.parent = replacement.map(Ref::Allocated);
        edges.insert(container.id, replacement);
        report.record(Recovery::ParentCycleBroken {
            field: "parent".to_string(),
        });
    }
}

fn parent_id(container: &Container) -> Option<EntityId> {
    match &container.parent {
        Some(Ref::Allocated(id)) => Some(*id),
        _ => None,
    }
}

fn would_create_cycle(
    node: EntityId,
    candidate_parent: EntityId,
    edges: &HashMap<EntityId, Option<EntityId>>,
) -> bool {
    let mut visited = HashSet::new();
    let mut cursor = Some(candidate_parent);
    while let Some(current) = cursor {
        if current == node {
            return true;
        }
        if !visited.insert(current) {
            return true;
        }
        cursor = edges.get(&current).copied().flatten();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::break_cycles;
    use crate::model::graph::Container;
    use crate::model::reference::Ref;
    use crate::report::RunReport;
    use uuid::Uuid;

    fn container(n: u128, parent: Option<u128>) -> Container {
        let mut container = Container::new(Uuid::from_u128(n), format!("c{n}"));
        container.parent = parent.map(|p| Ref::Allocated(Uuid::from_u128(p)));
        container
    }

    #[test]
    fn two_node_cycle_is_rewritten_to_root() {
        let root = Uuid::from_u128(1);
        let mut containers = vec![container(1, None), container(2, Some(3)), container(3, Some(2))];
        let mut report = RunReport::new("drive");
        break_cycles(&mut containers, Some(root), &mut report);

        assert_eq!(containers[1].parent, Some(Ref::Allocated(root)));
        assert_eq!(containers[2].parent, Some(Ref::Allocated(Uuid::from_u128(2))));
        assert_eq!(report.count("parent_cycle_broken"), 1);
    }

    #[test]
    fn self_parent_is_rewritten() {
        let root = Uuid::from_u128(1);
        let mut containers = vec![container(1, None), container(2, Some(2))];
        let mut report = RunReport::new("drive");
        break_cycles(&mut containers, Some(root), &mut report);
        assert_eq!(containers[1].parent, Some(Ref::Allocated(root)));
    }

    #[test]
    fn acyclic_chain_is_untouched() {
        let mut containers = vec![container(1, None), container(2, Some(1)), container(3, Some(2))];
        let before = containers.clone();
        let mut report = RunReport::new("drive");
        break_cycles(&mut containers, Some(Uuid::from_u128(1)), &mut report);
        assert_eq!(containers, before);
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn root_in_cycle_clears_parent() {
        let mut containers = vec![container(1, Some(2)), container(2, Some(1))];
        let mut report = RunReport::new("drive");
        break_cycles(&mut containers, Some(Uuid::from_u128(1)), &mut report);
        assert_eq!(containers[0].parent, None);
        assert_eq!(containers[1].parent, Some(Ref::Allocated(Uuid::from_u128(1))));
    }
}
