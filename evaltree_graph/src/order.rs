// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Global evaluation order with cycle containment.

use core::cmp::Reverse;
use core::hash::Hash;
use std::collections::BinaryHeap;

use hashbrown::{HashMap, HashSet};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::graph::DependencyGraph;
use crate::scratch::TraversalScratch;

/// Indicates whether every key could be ordered by its dependencies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderCompletion {
    /// Every key was placed after all of its dependencies.
    Complete,
    /// Kahn's algorithm stalled: some keys never reached zero in-degree.
    ///
    /// Those keys are still present in the order, after all ordered keys.
    Cyclic {
        /// Number of keys in the unordered tail.
        remaining: usize,
    },
}

/// A linear evaluation order over every key of a [`DependencyGraph`].
///
/// Computed with Kahn's algorithm. When several keys are ready at once the
/// smallest key (by `Ord`) goes first; with [`InternId`](crate::InternId)
/// keys that is registration order, which makes the order deterministic.
///
/// If the graph has cycles, the keys that never become ready (cycle members
/// and everything downstream of them) form a **tail** that is appended in
/// ascending key order. Only true cycle members (strongly connected
/// components with more than one key, or a key that depends on itself) are
/// reported by [`is_cyclic`](Self::is_cyclic); keys merely downstream of a
/// cycle are ordered in the tail but are not cyclic themselves.
///
/// # Performance
///
/// - Computing the order is O((V + E) log V). The ready keys sit in a
///   min-heap so ties break by key; a plain queue would be O(V + E) but
///   would order each ready level by discovery instead.
/// - Cycle membership adds O(T log T + E) for a tail of size T.
/// - The order is meant to be recomputed on structural changes only, and
///   reused for every value change in between.
///
/// # Example
///
/// ```
/// use evaltree_graph::{DependencyGraph, EvaluationOrder, OrderCompletion};
///
/// let mut graph = DependencyGraph::<u32>::new();
/// // 1 <- 2, 1 <- 3, 2 <- 4, 3 <- 4
/// graph.add_dependency(2, 1);
/// graph.add_dependency(3, 1);
/// graph.add_dependency(4, 2);
/// graph.add_dependency(4, 3);
///
/// let order = EvaluationOrder::compute(&graph);
/// assert_eq!(order.as_slice(), &[1, 2, 3, 4]);
/// assert_eq!(order.completion(), OrderCompletion::Complete);
/// ```
#[derive(Debug, Clone)]
pub struct EvaluationOrder<K>
where
    K: Copy + Eq + Hash,
{
    order: Vec<K>,
    /// Length of the prefix that Kahn's algorithm ordered.
    acyclic_len: usize,
    positions: HashMap<K, usize>,
    cyclic: HashSet<K>,
}

impl<K> Default for EvaluationOrder<K>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self {
            order: Vec::new(),
            acyclic_len: 0,
            positions: HashMap::new(),
            cyclic: HashSet::new(),
        }
    }
}

impl<K> EvaluationOrder<K>
where
    K: Copy + Eq + Hash + Ord,
{
    /// Computes the evaluation order of every key in `graph`.
    #[must_use]
    pub fn compute(graph: &DependencyGraph<K>) -> Self {
        // Remaining in-degree for keys that still wait on dependencies.
        let mut in_degree: HashMap<K, usize> = HashMap::with_capacity(graph.len());
        let mut ready = BinaryHeap::with_capacity(graph.len());
        for key in graph.keys() {
            match graph.in_degree(key) {
                0 => ready.push(Reverse(key)),
                deg => {
                    in_degree.insert(key, deg);
                }
            }
        }

        let mut order = Vec::with_capacity(graph.len());
        while let Some(Reverse(key)) = ready.pop() {
            order.push(key);
            for dependent in graph.dependents(key) {
                if let Some(deg) = in_degree.get_mut(&dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        in_degree.remove(&dependent);
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        let acyclic_len = order.len();
        let mut tail: Vec<K> = in_degree.into_keys().collect();
        tail.sort_unstable();
        let cyclic = cycle_members(graph, &tail);
        order.extend(tail);

        let positions = order.iter().enumerate().map(|(i, &k)| (k, i)).collect();
        Self {
            order,
            acyclic_len,
            positions,
            cyclic,
        }
    }

    /// Returns the affected order for a change set.
    ///
    /// The result is `roots` plus everything transitively depending on them,
    /// as a sub-sequence of this order (relative order preserved). Roots that
    /// are not part of the order are ignored.
    ///
    /// `graph` must be the graph this order was computed from.
    pub fn affected(
        &self,
        graph: &DependencyGraph<K>,
        roots: impl IntoIterator<Item = K>,
        scratch: &mut TraversalScratch<K>,
    ) -> Vec<K> {
        scratch.reset();
        for root in roots {
            if self.positions.contains_key(&root) && scratch.visited.insert(root) {
                scratch.stack.push(root);
            }
        }
        while let Some(current) = scratch.stack.pop() {
            for dependent in graph.dependents(current) {
                if scratch.visited.insert(dependent) {
                    scratch.stack.push(dependent);
                }
            }
        }

        // A large closure is cheaper to read off the order than to sort.
        if scratch.visited.len().saturating_mul(4) >= self.order.len() {
            return self
                .order
                .iter()
                .copied()
                .filter(|k| scratch.visited.contains(k))
                .collect();
        }

        let mut out: Vec<(usize, K)> = scratch
            .visited
            .iter()
            .filter_map(|k| self.positions.get(k).map(|&pos| (pos, *k)))
            .collect();
        out.sort_unstable_by_key(|&(pos, _)| pos);
        out.into_iter().map(|(_, k)| k).collect()
    }
}

impl<K> EvaluationOrder<K>
where
    K: Copy + Eq + Hash,
{
    /// Returns the full order.
    #[must_use]
    pub fn as_slice(&self) -> &[K] {
        &self.order
    }

    /// Returns the number of ordered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the order is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if `key` is part of the order.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.positions.contains_key(&key)
    }

    /// Returns the position of `key` in the order.
    #[must_use]
    pub fn position(&self, key: K) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    /// Returns the prefix ordered by dependencies.
    #[must_use]
    pub fn acyclic(&self) -> &[K] {
        &self.order[..self.acyclic_len]
    }

    /// Returns the tail of keys that could not be ordered by dependencies.
    #[must_use]
    pub fn tail(&self) -> &[K] {
        &self.order[self.acyclic_len..]
    }

    /// Returns `true` if `key` is a member of a dependency cycle.
    #[must_use]
    pub fn is_cyclic(&self, key: K) -> bool {
        self.cyclic.contains(&key)
    }

    /// Returns the cycle members in evaluation order.
    #[must_use]
    pub fn cyclic_keys(&self) -> Vec<K> {
        self.tail()
            .iter()
            .copied()
            .filter(|k| self.cyclic.contains(k))
            .collect()
    }

    /// Returns the number of cycle members.
    #[must_use]
    pub fn cyclic_len(&self) -> usize {
        self.cyclic.len()
    }

    /// Returns whether the order is complete or has a cyclic tail.
    #[must_use]
    pub fn completion(&self) -> OrderCompletion {
        let remaining = self.order.len() - self.acyclic_len;
        if remaining == 0 {
            OrderCompletion::Complete
        } else {
            OrderCompletion::Cyclic { remaining }
        }
    }
}

/// Finds the keys of `tail` that sit on a cycle.
fn cycle_members<K>(graph: &DependencyGraph<K>, tail: &[K]) -> HashSet<K>
where
    K: Copy + Eq + Hash,
{
    let mut members = HashSet::new();
    if tail.is_empty() {
        return members;
    }

    let mut sub: DiGraph<K, ()> = DiGraph::with_capacity(tail.len(), tail.len());
    let index: HashMap<K, NodeIndex> = tail.iter().map(|&k| (k, sub.add_node(k))).collect();
    for &key in tail {
        for dep in graph.dependencies(key) {
            if let Some(&to) = index.get(&dep) {
                sub.add_edge(index[&key], to, ());
            }
        }
    }

    for scc in tarjan_scc(&sub) {
        let is_cycle = scc.len() > 1 || sub.contains_edge(scc[0], scc[0]);
        if is_cycle {
            members.extend(scc.into_iter().map(|idx| sub[idx]));
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topological_order_chain() {
        let mut graph = DependencyGraph::new();
        // 1 <- 2 <- 3 <- 4, registered out of order
        graph.add_dependency(4, 3);
        graph.add_dependency(2, 1);
        graph.add_dependency(3, 2);

        let order = EvaluationOrder::compute(&graph);
        assert_eq!(order.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(order.completion(), OrderCompletion::Complete);
        assert!(order.tail().is_empty());
    }

    #[test]
    fn every_key_follows_its_dependencies() {
        let mut graph = DependencyGraph::<u32>::new();
        for from in 1..40_u32 {
            graph.add_dependency(from, from / 2);
            graph.add_dependency(from, from / 3);
        }

        let order = EvaluationOrder::compute(&graph);
        for key in graph.keys() {
            for dep in graph.dependencies(key) {
                if dep != key {
                    assert!(order.position(dep) < order.position(key), "{dep} before {key}");
                }
            }
        }
    }

    #[test]
    fn ties_break_by_key_order() {
        let mut graph = DependencyGraph::new();
        graph.add_node(5);
        graph.add_node(3);
        graph.add_node(4);

        let order = EvaluationOrder::compute(&graph);
        assert_eq!(order.as_slice(), &[3, 4, 5]);
    }

    #[test]
    fn cycle_goes_to_tail_and_downstream_is_not_cyclic() {
        let mut graph = DependencyGraph::new();
        // 1 <-> 2, 3 depends on 1, 0 is independent, 4 depends on 0
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);
        graph.add_dependency(3, 1);
        graph.add_dependency(4, 0);

        let order = EvaluationOrder::compute(&graph);
        assert_eq!(order.acyclic(), &[0, 4]);
        assert_eq!(order.tail(), &[1, 2, 3]);
        assert_eq!(order.completion(), OrderCompletion::Cyclic { remaining: 3 });
        assert_eq!(order.cyclic_keys(), vec![1, 2]);
        assert!(!order.is_cyclic(3));
        assert_eq!(order.cyclic_len(), 2);
    }

    #[test]
    fn self_dependency_is_cyclic() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(1, 1);
        graph.add_node(2);

        let order = EvaluationOrder::compute(&graph);
        assert_eq!(order.as_slice(), &[2, 1]);
        assert!(order.is_cyclic(1));
        assert!(!order.is_cyclic(2));
    }

    #[test]
    fn affected_is_a_subsequence_of_the_order() {
        let mut graph = DependencyGraph::new();
        // 1 <- 2 <- 3, 1 <- 4, 5 alone
        graph.add_dependency(2, 1);
        graph.add_dependency(3, 2);
        graph.add_dependency(4, 1);
        graph.add_node(5);

        let order = EvaluationOrder::compute(&graph);
        let mut scratch = TraversalScratch::new();

        assert_eq!(order.affected(&graph, [2], &mut scratch), vec![2, 3]);
        assert_eq!(order.as_slice(), &[1, 2, 3, 4, 5]);
        assert_eq!(order.affected(&graph, [1], &mut scratch), vec![1, 2, 3, 4]);
        assert_eq!(order.affected(&graph, [5], &mut scratch), vec![5]);
        assert_eq!(order.affected(&graph, [99], &mut scratch), Vec::<u32>::new());
    }

    #[test]
    fn affected_through_a_cycle_terminates() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);
        graph.add_dependency(3, 1);

        let order = EvaluationOrder::compute(&graph);
        let affected = order.affected(&graph, [3], &mut TraversalScratch::new());
        assert_eq!(affected, vec![3]);
        let affected = order.affected(&graph, [2], &mut TraversalScratch::new());
        assert_eq!(affected, vec![1, 2, 3]);
    }

    #[test]
    fn empty_graph() {
        let graph = DependencyGraph::<u32>::new();
        let order = EvaluationOrder::compute(&graph);
        assert!(order.is_empty());
        assert_eq!(order.completion(), OrderCompletion::Complete);
    }
}
