//! Join path search over declared cube joins
//!
//! Joins are walked in both directions: a join declared on `orders` towards
//! `users` can also bring `orders` into a plan rooted at `users`. Neighbours
//! are visited in declaration order so the chosen path is deterministic.

use std::collections::{HashMap, VecDeque};

use super::error::PlanError;
use crate::plan::{Column, JoinStep};
use crate::semantic_model::{Registry, Relationship};

/// One traversable edge between two cubes
#[derive(Debug, Clone, Copy)]
struct Edge<'a> {
    source: &'a str,
    target: &'a str,
    relationship: Relationship,
    /// Column on `source`
    source_key: &'a str,
    /// Column on `target`
    target_key: &'a str,
}

/// Outgoing edges of `cube`: its own joins first, then reversed joins that
/// other cubes declare towards it
fn edges<'a>(registry: &'a Registry, cube: &'a str) -> Vec<Edge<'a>> {
    let mut out = Vec::new();
    if let Some(c) = registry.get_cube(cube) {
        out.extend(c.joins.iter().map(|j| Edge {
            source: &c.name,
            target: &j.cube,
            relationship: j.relationship,
            source_key: &j.left_key,
            target_key: &j.right_key,
        }));
    }
    for other in registry.cubes().filter(|c| c.name != cube) {
        out.extend(other.joins.iter().filter(|j| j.cube == cube).map(|j| Edge {
            source: &j.cube,
            target: &other.name,
            relationship: j.relationship.reversed(),
            source_key: &j.right_key,
            target_key: &j.left_key,
        }));
    }
    out
}

/// Shortest chain of edges from `from` to `to` (breadth first)
fn find_path<'a>(registry: &'a Registry, from: &'a str, to: &str) -> Option<Vec<Edge<'a>>> {
    if from == to {
        return Some(Vec::new());
    }

    let mut parent: HashMap<&'a str, Edge<'a>> = HashMap::new();
    let mut queue = VecDeque::from([from]);

    while let Some(cube) = queue.pop_front() {
        for edge in edges(registry, cube) {
            if edge.target == from || parent.contains_key(edge.target) {
                continue;
            }
            parent.insert(edge.target, edge);
            if edge.target == to {
                let mut path = vec![edge];
                let mut current = edge.source;
                while current != from {
                    let step = parent.get(current)?;
                    path.push(*step);
                    current = step.source;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(edge.target);
        }
    }
    None
}

/// Left joins needed to reach every cube in `targets` from `primary`.
///
/// The result is the union of the shortest paths, each cube joined once, in
/// the order the targets are first reached.
pub fn plan_joins<'t>(
    registry: &Registry,
    primary: &str,
    targets: impl IntoIterator<Item = &'t str>,
) -> Result<Vec<JoinStep>, PlanError> {
    let root = registry
        .get_cube(primary)
        .ok_or_else(|| PlanError::UnknownCube(primary.to_string()))?;

    let mut joined: Vec<&str> = vec![root.name.as_str()];
    let mut steps = Vec::new();

    for target in targets {
        if joined.contains(&target) {
            continue;
        }
        let path = find_path(registry, &root.name, target).ok_or_else(|| PlanError::UnreachableCube {
            from: primary.to_string(),
            to: target.to_string(),
        })?;

        for edge in path {
            if joined.contains(&edge.target) {
                continue;
            }
            let table = registry
                .get_cube(edge.target)
                .map(|c| c.table.clone())
                .ok_or_else(|| PlanError::UnknownCube(edge.target.to_string()))?;
            steps.push(JoinStep {
                cube: edge.target.to_string(),
                table,
                relationship: edge.relationship,
                left_key: Column::new(edge.source, edge.source_key),
                right_key: Column::new(edge.target, edge.target_key),
            });
            joined.push(edge.target);
        }
    }
    Ok(steps)
}
