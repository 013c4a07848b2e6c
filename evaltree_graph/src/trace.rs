// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explainability helpers for affected-set computation.
//!
//! The graph does not store provenance for why a key ended up in an affected
//! set. Editors still want to answer "why did this property re-evaluate?".
//!
//! [`DependencyGraph::trace_dependents`](crate::DependencyGraph::trace_dependents)
//! reports every traversal step to an [`AffectTrace`] sink, and
//! [`OneParentRecorder`] keeps **one plausible cause path** per key (a
//! spanning forest).

use core::hash::Hash;

use hashbrown::{HashMap, HashSet};

/// The recorded cause of a key being affected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AffectCause<K> {
    /// The key was part of the change set itself.
    Root,
    /// The key was reached because it depends on `because`.
    Because {
        /// The immediate upstream key.
        because: K,
    },
}

/// A callback sink for affected-set tracing.
pub trait AffectTrace<K> {
    /// Called for each key of the change set.
    fn root(&mut self, key: K);

    /// Called when `key` is reached from `because` during propagation.
    fn caused_by(&mut self, key: K, because: K);
}

/// Records one parent pointer per affected key (a spanning forest).
///
/// When a key has multiple possible upstream causes, the first one observed
/// wins.
///
/// # Example
///
/// ```
/// use evaltree_graph::trace::OneParentRecorder;
/// use evaltree_graph::{DependencyGraph, TraversalScratch};
///
/// let mut graph = DependencyGraph::<u32>::new();
/// graph.add_dependency(2, 1);
/// graph.add_dependency(3, 2);
///
/// let mut rec = OneParentRecorder::new();
/// graph.trace_dependents([1], &mut TraversalScratch::new(), &mut rec);
/// assert_eq!(rec.explain_path(3), Some(vec![1, 2, 3]));
/// ```
#[derive(Debug, Clone)]
pub struct OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    causes: HashMap<K, AffectCause<K>>,
}

impl<K> Default for OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            causes: HashMap::new(),
        }
    }

    /// Clears all recorded causes.
    pub fn clear(&mut self) {
        self.causes.clear();
    }

    /// Returns the recorded cause for `key`, if any.
    #[must_use]
    pub fn cause(&self, key: K) -> Option<AffectCause<K>> {
        self.causes.get(&key).copied()
    }

    /// Returns one plausible path from a root of the change set to `key`.
    ///
    /// The returned vector is ordered from root to `key` (inclusive).
    #[must_use]
    pub fn explain_path(&self, key: K) -> Option<Vec<K>> {
        let mut out = Vec::new();
        let mut seen: HashSet<K> = HashSet::new();

        let mut current = key;
        loop {
            if !seen.insert(current) {
                return None;
            }
            out.push(current);

            match self.cause(current)? {
                AffectCause::Root => break,
                AffectCause::Because { because } => current = because,
            }
        }

        out.reverse();
        Some(out)
    }
}

impl<K> AffectTrace<K> for OneParentRecorder<K>
where
    K: Copy + Eq + Hash,
{
    fn root(&mut self, key: K) {
        // A root always explains itself, even if reached earlier from another root.
        self.causes.insert(key, AffectCause::Root);
    }

    fn caused_by(&mut self, key: K, because: K) {
        self.causes
            .entry(key)
            .or_insert(AffectCause::Because { because });
    }
}
