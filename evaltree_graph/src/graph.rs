// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency graph with a reverse index.

use core::hash::Hash;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::scratch::TraversalScratch;
use crate::trace::AffectTrace;

type Adjacency<K> = SmallVec<[K; 4]>;

/// Dependency graph: "A depends on B" edges plus the reverse index.
///
/// `DependencyGraph` stores bidirectional edges, so both "what does A read?"
/// and "what reads A?" are answered without scanning. Keys can be present as
/// isolated nodes (a constant with no dependencies is still something that
/// has to be placed in the evaluation order).
///
/// Unlike a DAG-only store, cycles (including self-dependencies) are
/// accepted as authored; [`EvaluationOrder`](crate::EvaluationOrder) is
/// responsible for containing them.
///
/// # Example
///
/// ```
/// use evaltree_graph::DependencyGraph;
///
/// let mut graph = DependencyGraph::<u32>::new();
///
/// // Node 2 depends on node 1, node 3 depends on node 2.
/// graph.add_dependency(2, 1);
/// graph.add_dependency(3, 2);
///
/// assert!(graph.dependencies(2).any(|k| k == 1));
/// assert!(graph.dependents(1).any(|k| k == 2));
///
/// let transitive: Vec<_> = graph.transitive_dependents(1).collect();
/// assert!(transitive.contains(&2));
/// assert!(transitive.contains(&3));
/// ```
#[derive(Debug, Clone)]
pub struct DependencyGraph<K>
where
    K: Copy + Eq + Hash,
{
    nodes: HashSet<K>,
    /// Forward edges: key -> keys it depends on.
    forward: HashMap<K, Adjacency<K>>,
    /// Reverse edges: key -> keys that depend on it.
    reverse: HashMap<K, Adjacency<K>>,
    edge_count: usize,
}

impl<K> Default for DependencyGraph<K>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> DependencyGraph<K>
where
    K: Copy + Eq + Hash,
{
    /// Creates a new empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashSet::new(),
            forward: HashMap::new(),
            reverse: HashMap::new(),
            edge_count: 0,
        }
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns `true` if `key` is a node of the graph.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.nodes.contains(&key)
    }

    /// Adds `key` as a node without any edges.
    ///
    /// Returns `true` if the node was new.
    pub fn add_node(&mut self, key: K) -> bool {
        self.nodes.insert(key)
    }

    /// Adds a dependency: `from` depends on `to`.
    ///
    /// Both keys become nodes if they were not already. A self-dependency is
    /// stored like any other edge and later shows up as a cycle.
    ///
    /// Returns `true` if the edge was newly added, `false` if it existed.
    pub fn add_dependency(&mut self, from: K, to: K) -> bool {
        self.nodes.insert(from);
        self.nodes.insert(to);

        let fwd = self.forward.entry(from).or_default();
        if fwd.contains(&to) {
            return false;
        }
        fwd.push(to);
        self.reverse.entry(to).or_default().push(from);
        self.edge_count += 1;
        true
    }

    /// Removes a dependency: `from` no longer depends on `to`.
    ///
    /// Returns `true` if the dependency existed and was removed. Both keys stay
    /// in the graph as nodes.
    pub fn remove_dependency(&mut self, from: K, to: K) -> bool {
        let Some(fwd) = self.forward.get_mut(&from) else {
            return false;
        };
        let Some(pos) = fwd.iter().position(|&k| k == to) else {
            return false;
        };
        fwd.swap_remove(pos);
        if fwd.is_empty() {
            self.forward.remove(&from);
        }

        if let Some(rev) = self.reverse.get_mut(&to) {
            if let Some(pos) = rev.iter().position(|&k| k == from) {
                rev.swap_remove(pos);
            }
            if rev.is_empty() {
                self.reverse.remove(&to);
            }
        }

        self.edge_count -= 1;
        true
    }

    /// Replaces all direct dependencies of `from`.
    ///
    /// - Dependencies present in the old set but missing from `to` are removed.
    /// - Dependencies present in `to` but missing from the old set are added.
    /// - Dependencies present in both sets are left unchanged.
    /// - Duplicate keys in `to` are ignored.
    ///
    /// `from` becomes a node even when `to` is empty.
    ///
    /// Returns `true` if the dependency set changed.
    pub fn replace_dependencies(&mut self, from: K, to: impl IntoIterator<Item = K>) -> bool {
        self.nodes.insert(from);

        let mut new_set: Adjacency<K> = SmallVec::new();
        for k in to {
            if !new_set.contains(&k) {
                new_set.push(k);
            }
        }

        let old: Adjacency<K> = self.forward.get(&from).cloned().unwrap_or_default();
        let unchanged = old.len() == new_set.len() && old.iter().all(|dep| new_set.contains(dep));
        if unchanged {
            return false;
        }

        for &dep in &old {
            if !new_set.contains(&dep) {
                self.remove_dependency(from, dep);
            }
        }
        for &dep in &new_set {
            if !old.contains(&dep) {
                self.add_dependency(from, dep);
            }
        }
        true
    }

    /// Removes a key entirely from the graph.
    ///
    /// This removes all edges involving `key`, both as a dependent and as a
    /// dependency. Returns `true` if the key was a node.
    pub fn remove_key(&mut self, key: K) -> bool {
        if let Some(deps) = self.forward.remove(&key) {
            for dep in deps {
                self.edge_count -= 1;
                if let Some(rev) = self.reverse.get_mut(&dep) {
                    if let Some(pos) = rev.iter().position(|&k| k == key) {
                        rev.swap_remove(pos);
                    }
                    if rev.is_empty() {
                        self.reverse.remove(&dep);
                    }
                }
            }
        }

        if let Some(dependents) = self.reverse.remove(&key) {
            for dependent in dependents {
                let Some(fwd) = self.forward.get_mut(&dependent) else {
                    continue;
                };
                if let Some(pos) = fwd.iter().position(|&k| k == key) {
                    fwd.swap_remove(pos);
                    self.edge_count -= 1;
                }
                if fwd.is_empty() {
                    self.forward.remove(&dependent);
                }
            }
        }

        self.nodes.remove(&key)
    }

    /// Returns an iterator over the direct dependencies of `key`.
    ///
    /// These are the keys that `key` reads from. Iteration order is insertion
    /// order, except that removals may reorder the remaining entries.
    #[inline]
    pub fn dependencies(&self, key: K) -> impl Iterator<Item = K> + '_ {
        self.forward
            .get(&key)
            .map(SmallVec::as_slice)
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Returns an iterator over the direct dependents of `key`.
    ///
    /// These are the keys that read from `key`.
    #[inline]
    pub fn dependents(&self, key: K) -> impl Iterator<Item = K> + '_ {
        self.reverse
            .get(&key)
            .map(SmallVec::as_slice)
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Returns `true` if `key` depends on anything.
    #[inline]
    #[must_use]
    pub fn has_dependencies(&self, key: K) -> bool {
        self.forward.contains_key(&key)
    }

    /// Returns `true` if anything depends on `key`.
    #[must_use]
    pub fn has_dependents(&self, key: K) -> bool {
        self.reverse.contains_key(&key)
    }

    /// Returns the in-degree of `key`: the number of keys it depends on.
    #[must_use]
    pub fn in_degree(&self, key: K) -> usize {
        self.forward.get(&key).map_or(0, SmallVec::len)
    }

    /// Returns the out-degree of `key`: the number of keys that depend on it.
    #[must_use]
    pub fn out_degree(&self, key: K) -> usize {
        self.reverse.get(&key).map_or(0, SmallVec::len)
    }

    /// Returns an iterator over all nodes.
    ///
    /// The iteration order is not specified and may vary across runs.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.nodes.iter().copied()
    }

    /// Returns an iterator over all transitive dependents of `key`.
    ///
    /// This performs a DFS over the reverse index and yields every key that
    /// directly or indirectly reads `key`. `key` itself is only yielded if it
    /// sits on a cycle.
    ///
    /// The iteration order is not specified.
    pub fn transitive_dependents(&self, key: K) -> impl Iterator<Item = K> + '_ {
        TransitiveDependentsIter::new(self, key)
    }

    /// Calls `f` for each transitive dependent of `key`, using reusable scratch buffers.
    ///
    /// This is equivalent to iterating [`transitive_dependents`](Self::transitive_dependents),
    /// but allows the caller to reuse allocations across traversals.
    pub fn for_each_transitive_dependent(
        &self,
        key: K,
        scratch: &mut TraversalScratch<K>,
        mut f: impl FnMut(K),
    ) {
        scratch.reset();
        scratch.stack.extend(self.dependents(key));

        while let Some(next) = scratch.stack.pop() {
            if scratch.visited.insert(next) {
                f(next);
                scratch.stack.extend(self.dependents(next));
            }
        }
    }

    /// Walks everything reachable from `roots` through the reverse index and
    /// reports each step to `trace`.
    ///
    /// Roots are reported through [`AffectTrace::root`]; every edge followed
    /// is reported through [`AffectTrace::caused_by`], including edges into
    /// keys that were already reached.
    pub fn trace_dependents(
        &self,
        roots: impl IntoIterator<Item = K>,
        scratch: &mut TraversalScratch<K>,
        trace: &mut dyn AffectTrace<K>,
    ) {
        scratch.reset();
        for root in roots {
            trace.root(root);
            if scratch.visited.insert(root) {
                scratch.stack.push(root);
            }
        }

        while let Some(current) = scratch.stack.pop() {
            for dependent in self.dependents(current) {
                trace.caused_by(dependent, current);
                if scratch.visited.insert(dependent) {
                    scratch.stack.push(dependent);
                }
            }
        }
    }
}

/// Iterator over transitive dependents using DFS.
struct TransitiveDependentsIter<'a, K>
where
    K: Copy + Eq + Hash,
{
    graph: &'a DependencyGraph<K>,
    visited: HashSet<K>,
    stack: Vec<K>,
}

impl<'a, K> TransitiveDependentsIter<'a, K>
where
    K: Copy + Eq + Hash,
{
    fn new(graph: &'a DependencyGraph<K>, start: K) -> Self {
        let mut iter = Self {
            graph,
            visited: HashSet::new(),
            stack: Vec::new(),
        };
        iter.stack.extend(graph.dependents(start));
        iter
    }
}

impl<K> Iterator for TransitiveDependentsIter<'_, K>
where
    K: Copy + Eq + Hash,
{
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(key) = self.stack.pop() {
            if self.visited.insert(key) {
                self.stack.extend(self.graph.dependents(key));
                return Some(key);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_query_dependencies() {
        let mut graph = DependencyGraph::<u32>::new();

        assert!(graph.add_dependency(2, 1));
        assert!(graph.add_dependency(3, 2));
        assert!(!graph.add_dependency(3, 2));

        assert!(graph.dependencies(2).any(|k| k == 1));
        assert!(graph.dependents(1).any(|k| k == 2));
        assert!(graph.dependents(2).any(|k| k == 3));
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn isolated_nodes_are_kept() {
        let mut graph = DependencyGraph::<u32>::new();
        assert!(graph.add_node(7));
        assert!(!graph.add_node(7));
        assert!(graph.contains(7));
        assert!(!graph.has_dependencies(7));
        assert!(!graph.has_dependents(7));
    }

    #[test]
    fn replace_dependencies_updates_in_place() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(10, 1);
        graph.add_dependency(10, 2);

        assert!(graph.replace_dependencies(10, [3, 4]));

        let deps: Vec<_> = graph.dependencies(10).collect();
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&3));
        assert!(deps.contains(&4));
        assert!(!graph.dependents(1).any(|k| k == 10));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn replace_dependencies_noop_when_set_unchanged_returns_false() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(10, 1);
        graph.add_dependency(10, 2);

        // Duplicates and ordering differences should not count as a change.
        assert!(!graph.replace_dependencies(10, [2, 1, 2]));
        assert_eq!(graph.in_degree(10), 2);
    }

    #[test]
    fn replace_with_empty_keeps_node() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(10, 1);
        assert!(graph.replace_dependencies(10, []));
        assert!(graph.contains(10));
        assert!(!graph.has_dependencies(10));
        assert!(!graph.has_dependents(1));
    }

    #[test]
    fn remove_dependency() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(2, 1);

        assert!(graph.remove_dependency(2, 1));
        assert!(!graph.remove_dependency(2, 1));
        assert!(!graph.has_dependencies(2));
        assert!(!graph.has_dependents(1));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.contains(1) && graph.contains(2));
    }

    #[test]
    fn remove_key() {
        let mut graph = DependencyGraph::<u32>::new();
        // 1 <- 2 <- 3, 2 <- 4
        graph.add_dependency(2, 1);
        graph.add_dependency(3, 2);
        graph.add_dependency(4, 2);

        assert!(graph.remove_key(2));

        assert!(!graph.contains(2));
        assert!(!graph.has_dependents(1));
        assert!(!graph.has_dependencies(3));
        assert!(!graph.has_dependencies(4));
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.remove_key(2));
    }

    #[test]
    fn remove_key_with_self_dependency() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(1, 1);
        graph.add_dependency(2, 1);
        assert!(graph.remove_key(1));
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.has_dependencies(2));
    }

    #[test]
    fn transitive_dependents() {
        let mut graph = DependencyGraph::<u32>::new();
        // 1 <- 2 <- 3, 1 <- 4
        graph.add_dependency(2, 1);
        graph.add_dependency(3, 2);
        graph.add_dependency(4, 1);

        let mut transitive: Vec<_> = graph.transitive_dependents(1).collect();
        transitive.sort_unstable();
        assert_eq!(transitive, vec![2, 3, 4]);

        let mut scratch = TraversalScratch::new();
        let mut seen = Vec::new();
        graph.for_each_transitive_dependent(2, &mut scratch, |k| seen.push(k));
        assert_eq!(seen, vec![3]);
    }

    #[test]
    fn transitive_dependents_terminate_on_cycles() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);

        let mut transitive: Vec<_> = graph.transitive_dependents(1).collect();
        transitive.sort_unstable();
        assert_eq!(transitive, vec![1, 2]);
    }

    #[test]
    fn in_out_degree() {
        let mut graph = DependencyGraph::<u32>::new();
        graph.add_dependency(3, 1);
        graph.add_dependency(3, 2);
        graph.add_dependency(4, 1);

        assert_eq!(graph.in_degree(3), 2);
        assert_eq!(graph.out_degree(1), 2);
        assert_eq!(graph.out_degree(3), 0);
    }
}
