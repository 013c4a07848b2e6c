// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The path-keyed dependency graph.

use std::collections::BTreeMap;

use evaltree_graph::trace::OneParentRecorder;
use evaltree_graph::{DependencyGraph, EvaluationOrder, InternId, Interner, TraversalScratch};
use hashbrown::HashMap;

use crate::extract::DependencyMap;

/// Dependency graph over full paths.
///
/// Paths are interned once; the id order is the order paths were first
/// seen, which is what breaks ties in the evaluation order. Each entity owns
/// the nodes it last registered, so replacing or removing an entity touches
/// only its own nodes and edges.
#[derive(Debug, Default)]
pub struct PathGraph {
    ids: Interner<String>,
    graph: DependencyGraph<InternId>,
    owned: HashMap<String, Vec<InternId>>,
    order: EvaluationOrder<InternId>,
    order_stale: bool,
    scratch: TraversalScratch<InternId>,
}

impl PathGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of path nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if `path` is a node.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.id(path).is_some_and(|id| self.graph.contains(id))
    }

    /// Returns the id of `path`, if it was ever interned.
    #[must_use]
    pub fn id(&self, path: &str) -> Option<InternId> {
        self.ids.lookup(path)
    }

    /// Returns the path of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    #[must_use]
    pub fn path(&self, id: InternId) -> &str {
        self.ids
            .get(id)
            .map(String::as_str)
            .expect("ids are only handed out by this graph's interner")
    }

    /// Replaces every node and edge owned by `entity` with `map`.
    ///
    /// Each key of `map` becomes a node owned by `entity` with exactly the
    /// listed dependencies. Nodes the entity owned before but no longer lists
    /// are removed together with their edges.
    pub fn add_or_update(&mut self, entity: &str, map: &DependencyMap) {
        let mut nodes = Vec::with_capacity(map.len());
        for (path, deps) in map {
            let from = self.ids.intern(path.clone());
            let to: Vec<InternId> = deps.iter().map(|d| self.ids.intern(d.clone())).collect();
            self.graph.add_node(from);
            self.graph.replace_dependencies(from, to);
            nodes.push(from);
        }
        if let Some(previous) = self.owned.insert(entity.to_owned(), nodes) {
            let current = &self.owned[entity];
            for id in previous {
                if !current.contains(&id) {
                    self.graph.remove_key(id);
                }
            }
        }
        self.order_stale = true;
    }

    /// Removes every node owned by `entity`. Returns `false` if it owned none.
    pub fn remove(&mut self, entity: &str) -> bool {
        let Some(nodes) = self.owned.remove(entity) else {
            return false;
        };
        for id in nodes {
            self.graph.remove_key(id);
        }
        self.order_stale = true;
        true
    }

    /// Recomputes the evaluation order if the structure changed since the
    /// last computation. Returns `true` if it did.
    pub fn refresh_order(&mut self) -> bool {
        if !self.order_stale {
            return false;
        }
        self.order = EvaluationOrder::compute(&self.graph);
        self.order_stale = false;
        tracing::debug!(
            nodes = self.graph.len(),
            edges = self.graph.edge_count(),
            cyclic = self.order.cyclic_len(),
            "recomputed evaluation order"
        );
        true
    }

    /// Returns the evaluation order, recomputing it if needed.
    pub fn order(&mut self) -> &EvaluationOrder<InternId> {
        self.refresh_order();
        &self.order
    }

    /// Returns the full evaluation order as paths.
    pub fn evaluation_order(&mut self) -> Vec<String> {
        self.refresh_order();
        self.order
            .as_slice()
            .iter()
            .map(|&id| self.path(id).to_owned())
            .collect()
    }

    /// Returns the affected order for `roots`: the roots and everything
    /// that transitively reads them, in evaluation order.
    ///
    /// Roots that are not nodes are ignored.
    pub fn affected(&mut self, roots: impl IntoIterator<Item = InternId>) -> Vec<InternId> {
        self.refresh_order();
        self.order.affected(&self.graph, roots, &mut self.scratch)
    }

    /// Returns `true` if `id` is a member of a dependency cycle.
    ///
    /// The order must be fresh; see [`refresh_order`](Self::refresh_order).
    #[must_use]
    pub fn is_cyclic(&self, id: InternId) -> bool {
        self.order.is_cyclic(id)
    }

    /// Number of cycle members in the last computed order.
    #[must_use]
    pub fn cyclic_len(&self) -> usize {
        self.order.cyclic_len()
    }

    /// Returns the members of dependency cycles, in evaluation order.
    pub fn cyclic_paths(&mut self) -> Vec<String> {
        self.refresh_order();
        self.order
            .tail()
            .iter()
            .filter(|&&id| self.order.is_cyclic(id))
            .map(|&id| self.path(id).to_owned())
            .collect()
    }

    /// Iterates over the node ids.
    pub fn node_ids(&self) -> impl Iterator<Item = InternId> + '_ {
        self.graph.keys()
    }

    /// Returns the paths `path` reads directly.
    #[must_use]
    pub fn dependencies(&self, path: &str) -> Vec<String> {
        self.neighbors(path, |g, id| g.dependencies(id).collect())
    }

    /// Returns the paths that read `path` directly.
    #[must_use]
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.neighbors(path, |g, id| g.dependents(id).collect())
    }

    fn neighbors(
        &self,
        path: &str,
        f: impl FnOnce(&DependencyGraph<InternId>, InternId) -> Vec<InternId>,
    ) -> Vec<String> {
        let Some(id) = self.id(path) else {
            return Vec::new();
        };
        let mut ids = f(&self.graph, id);
        ids.sort_unstable();
        ids.into_iter().map(|d| self.path(d).to_owned()).collect()
    }

    /// Exports the graph as a path-to-dependencies map.
    ///
    /// Every node appears as a key, with its dependencies in registration
    /// order.
    #[must_use]
    pub fn dependency_map(&self) -> BTreeMap<String, Vec<String>> {
        self.graph
            .keys()
            .map(|id| {
                let path = self.path(id);
                (path.to_owned(), self.dependencies(path))
            })
            .collect()
    }

    /// Explains why `target` is affected by a change to `roots`.
    ///
    /// Returns one chain of paths from a root to `target`, or `None` if
    /// `target` is not affected.
    pub fn explain(&mut self, roots: &[&str], target: &str) -> Option<Vec<String>> {
        let target = self.id(target)?;
        let roots: Vec<InternId> = roots.iter().filter_map(|r| self.id(r)).collect();
        let mut recorder = OneParentRecorder::new();
        self.graph
            .trace_dependents(roots, &mut self.scratch, &mut recorder);
        let chain = recorder.explain_path(target)?;
        Some(chain.into_iter().map(|id| self.path(id).to_owned()).collect())
    }
}
