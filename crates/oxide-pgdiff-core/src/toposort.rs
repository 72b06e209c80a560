//! Deterministic topological sort (Kahn's algorithm).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{CatalogError, Result};
use crate::key::ObjectKey;

/// Orders `nodes` so that every node comes after the nodes it depends on.
///
/// `deps` maps a node to its dependencies; edges pointing outside `nodes`
/// and self-edges are ignored. Ready nodes are processed in key order, so
/// the result is stable across runs. Nodes left over when no further node
/// becomes ready form (or depend on) a cycle and are reported as
/// [`CatalogError::DependencyCycle`].
pub fn toposort(
    nodes: &BTreeSet<ObjectKey>,
    deps: &BTreeMap<ObjectKey, BTreeSet<ObjectKey>>,
) -> Result<Vec<ObjectKey>> {
    let mut pending: BTreeMap<&ObjectKey, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&ObjectKey, BTreeSet<&ObjectKey>> = BTreeMap::new();
    for node in nodes {
        let count = deps.get(node).map_or(0, |node_deps| {
            node_deps
                .iter()
                .filter(|dep| *dep != node && nodes.contains(*dep))
                .inspect(|dep| {
                    dependents.entry(*dep).or_default().insert(node);
                })
                .count()
        });
        pending.insert(node, count);
    }

    let mut queue: VecDeque<&ObjectKey> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        pending.remove(node);
        if let Some(children) = dependents.get(node) {
            for child in children {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }
    }

    if pending.is_empty() {
        Ok(order)
    } else {
        Err(CatalogError::DependencyCycle(
            pending.keys().map(ToString::to_string).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ObjectKind;

    fn table(name: &str) -> ObjectKey {
        ObjectKey::scoped(ObjectKind::Table, "public", name)
    }

    fn graph(edges: &[(&ObjectKey, &ObjectKey)]) -> BTreeMap<ObjectKey, BTreeSet<ObjectKey>> {
        let mut deps: BTreeMap<ObjectKey, BTreeSet<ObjectKey>> = BTreeMap::new();
        for (from, to) in edges {
            deps.entry((*from).clone()).or_default().insert((*to).clone());
        }
        deps
    }

    #[test]
    fn test_dependencies_come_first() {
        let (a, b, c) = (table("a"), table("b"), table("c"));
        let nodes: BTreeSet<_> = [a.clone(), b.clone(), c.clone()].into();
        let deps = graph(&[(&a, &c), (&b, &a)]);
        assert_eq!(toposort(&nodes, &deps).unwrap(), vec![c, a, b]);
    }

    #[test]
    fn test_ties_follow_key_order() {
        let schema = ObjectKey::new(ObjectKind::Schema, "public");
        let (t2, t1) = (table("t2"), table("t1"));
        let nodes: BTreeSet<_> = [t2.clone(), t1.clone(), schema.clone()].into();
        let deps = graph(&[(&t1, &schema), (&t2, &schema)]);
        assert_eq!(toposort(&nodes, &deps).unwrap(), vec![schema, t1, t2]);
    }

    #[test]
    fn test_outside_edges_ignored() {
        let (a, b) = (table("a"), table("b"));
        let nodes: BTreeSet<_> = [a.clone()].into();
        let deps = graph(&[(&a, &b), (&a, &a)]);
        assert_eq!(toposort(&nodes, &deps).unwrap(), vec![a]);
    }

    #[test]
    fn test_cycle_detected() {
        let (a, b, c) = (table("a"), table("b"), table("c"));
        let nodes: BTreeSet<_> = [a.clone(), b.clone(), c.clone()].into();
        let deps = graph(&[(&a, &b), (&b, &a)]);
        match toposort(&nodes, &deps) {
            Err(CatalogError::DependencyCycle(members)) => {
                assert_eq!(members, vec!["table public.a", "table public.b"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }
}
