// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Kahn's algorithm over a small task graph.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

/// Returned when the task graph contains a cycle.
///
/// Carries the nodes that could not be scheduled, in their declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// Nodes left with unresolved dependencies.
    pub unresolved: Vec<T>,
}

impl<T: Debug> std::fmt::Display for CycleError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dependency cycle between {:?}", self.unresolved)
    }
}

impl<T: Debug> std::error::Error for CycleError<T> {}

/// Orders `nodes` so that every `(before, after)` edge is respected.
///
/// Ready nodes are emitted in their declaration order, which makes the result
/// deterministic for a given input. Edges that mention unknown nodes are ignored.
///
/// # Arguments
///
/// * `nodes`: The unique nodes of the graph.
/// * `edges`: Dependencies as `(before, after)` pairs.
///
/// # Returns
///
/// * `Ok(Vec<T>)`: The nodes in execution order.
/// * `Err(CycleError)`: If some nodes can never become ready.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    let position: HashMap<T, usize> = node_list
        .iter()
        .enumerate()
        .map(|(index, node)| (*node, index))
        .collect();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_list.len()];
    let mut in_degree = vec![0usize; node_list.len()];
    for (before, after) in edges {
        if let (Some(&from), Some(&to)) = (position.get(&before), position.get(&after)) {
            successors[from].push(to);
            in_degree[to] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..node_list.len())
        .filter(|&index| in_degree[index] == 0)
        .collect();
    let mut order = Vec::with_capacity(node_list.len());

    while let Some(index) = ready.pop_front() {
        order.push(node_list[index]);
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() == node_list.len() {
        Ok(order)
    } else {
        let unresolved = (0..node_list.len())
            .filter(|&index| in_degree[index] > 0)
            .map(|index| node_list[index])
            .collect();
        Err(CycleError { unresolved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_keeps_dependency_order() {
        let order = topological_sort([4, 3, 2, 1], [(1, 2), (2, 3), (3, 4)]).unwrap();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn independent_nodes_keep_declaration_order() {
        let order = topological_sort(['c', 'a', 'b'], []).unwrap();
        assert_eq!(order, vec!['c', 'a', 'b']);
    }

    #[test]
    fn diamond_is_ordered() {
        let order = topological_sort([1, 2, 3, 4], [(1, 2), (1, 3), (2, 4), (3, 4)]).unwrap();
        assert_eq!(order.first(), Some(&1));
        assert_eq!(order.last(), Some(&4));
    }

    #[test]
    fn cycle_reports_unresolved_nodes() {
        let err = topological_sort([1, 2, 3], [(1, 2), (2, 3), (3, 2)]).unwrap_err();
        assert_eq!(err.unresolved, vec![2, 3]);
    }

    #[test]
    fn unknown_edge_endpoints_are_ignored() {
        let order = topological_sort([1, 2], [(1, 2), (2, 9)]).unwrap();
        assert_eq!(order, vec![1, 2]);
    }
}
