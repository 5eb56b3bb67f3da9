// SPDX-License-Identifier: MIT

//! Execution ordering (Kahn's algorithm)

use std::collections::{HashMap, HashSet, VecDeque};

use crate::adk::error::DependencyError;
use crate::scribe::workflow::types::{NodeId, NodeMap};

/// Validate the node graph and compute a deterministic execution order.
///
/// Every dependency edge comes from a virtual block reference; a node that
/// references the same source several times contributes a single edge.
/// Nodes that become ready together run in node-map order.
///
/// A reference to an unknown node fails with [`DependencyError::Missing`]
/// before any ordering is attempted. Nodes that can never become ready are
/// reported together as [`DependencyError::Cycle`].
pub fn build(nodes: &NodeMap) -> Result<Vec<NodeId>, DependencyError> {
    let mut in_degree: HashMap<&str, usize> = nodes.ids().map(|id| (id, 0)).collect();
    let mut dependents: HashMap<String, Vec<&str>> = HashMap::new();

    for node in nodes.iter() {
        for dep_id in node.dependencies() {
            if !nodes.contains(&dep_id) {
                return Err(DependencyError::Missing {
                    dependent_id: node.id.clone(),
                    missing_id: dep_id,
                });
            }
            if let Some(degree) = in_degree.get_mut(node.id.as_str()) {
                *degree += 1;
            }
            dependents.entry(dep_id).or_default().push(node.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = nodes.ids().filter(|id| in_degree[id] == 0).collect();
    let mut order: Vec<NodeId> = Vec::with_capacity(nodes.len());

    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());
        if let Some(next) = dependents.get(current) {
            for &dependent in next {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
    }

    if order.len() != nodes.len() {
        let visited: HashSet<&str> = order.iter().map(String::as_str).collect();
        let node_ids: Vec<NodeId> = nodes
            .ids()
            .filter(|id| !visited.contains(id))
            .map(str::to_string)
            .collect();
        log::error!("Cycle detected among nodes: {:?}", node_ids);
        return Err(DependencyError::Cycle { node_ids });
    }

    Ok(order)
}
