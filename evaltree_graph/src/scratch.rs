// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reusable scratch buffers for graph traversals.

use core::hash::Hash;

use hashbrown::HashSet;

/// Reusable scratch storage for graph traversals.
///
/// Evaluators compute an affected closure on every pass. Reusing one scratch
/// instance per evaluator keeps those passes from re-allocating the stack and
/// visited set each time.
///
/// The scratch buffers retain capacity across calls.
///
/// # See Also
///
/// - [`DependencyGraph::for_each_transitive_dependent`](crate::DependencyGraph::for_each_transitive_dependent)
/// - [`EvaluationOrder::affected`](crate::EvaluationOrder::affected)
#[derive(Debug)]
pub struct TraversalScratch<K>
where
    K: Copy + Eq + Hash,
{
    pub(crate) stack: Vec<K>,
    pub(crate) visited: HashSet<K>,
}

impl<K> Default for TraversalScratch<K>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TraversalScratch<K>
where
    K: Copy + Eq + Hash,
{
    /// Creates an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Creates an empty scratch buffer with pre-allocated capacity.
    ///
    /// `capacity` is a best-effort hint for both the internal stack and the
    /// visited set.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stack: Vec::with_capacity(capacity),
            visited: HashSet::with_capacity(capacity),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.stack.clear();
        self.visited.clear();
    }
}
