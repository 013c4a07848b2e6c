// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaltree Graph: dependency-graph primitives for incremental evaluation.
//!
//! This crate provides the path-agnostic building blocks of an incremental
//! evaluator, where a change to one value must re-run exactly the values
//! that read from it. It models the problem as:
//!
//! - **Interning** ([`Interner`], [`InternId`]): owned keys (property paths)
//!   mapped to compact ids whose numeric order is the registration order.
//! - **Dependency graphs** ([`DependencyGraph`]): "A depends on B" edges with
//!   a reverse index for forward propagation. Cycles are allowed.
//! - **Evaluation order** ([`EvaluationOrder`]): Kahn's algorithm over the
//!   whole graph. Keys that never become ready (cycle members and anything
//!   downstream of them) are appended in registration order instead of
//!   aborting the sort; true cycle members are flagged individually.
//! - **Pending sets** ([`PendingSet`]): insertion-ordered, de-duplicated
//!   change queues.
//! - **Scratch buffers** ([`TraversalScratch`]): reusable traversal state.
//! - **Tracing** ([`trace`]): one-parent explanations of why a key was
//!   reached from a change set.
//!
//! ## Quick Start
//!
//! ```rust
//! use evaltree_graph::{DependencyGraph, EvaluationOrder, TraversalScratch};
//!
//! let mut graph = DependencyGraph::<u32>::new();
//!
//! // 3 depends on 2, 2 depends on 1, 4 stands alone.
//! graph.add_dependency(2, 1);
//! graph.add_dependency(3, 2);
//! graph.add_node(4);
//!
//! let order = EvaluationOrder::compute(&graph);
//! assert_eq!(order.as_slice(), &[1, 2, 3, 4]);
//!
//! // Only what reads from 2 needs to run again.
//! let mut scratch = TraversalScratch::new();
//! let affected = order.affected(&graph, [2], &mut scratch);
//! assert_eq!(affected, vec![2, 3]);
//! ```
//!
//! ## Cycles
//!
//! User-authored graphs may contain cycles. [`EvaluationOrder::compute`]
//! never fails: it reports [`OrderCompletion::Cyclic`] and keeps every key in
//! the order, so callers can still evaluate everything once and attach an
//! error to [`EvaluationOrder::is_cyclic`] keys.
//!
//! ```rust
//! use evaltree_graph::{DependencyGraph, EvaluationOrder, OrderCompletion};
//!
//! let mut graph = DependencyGraph::<u32>::new();
//! graph.add_dependency(1, 2);
//! graph.add_dependency(2, 1);
//! graph.add_dependency(3, 1);
//!
//! let order = EvaluationOrder::compute(&graph);
//! assert_eq!(order.completion(), OrderCompletion::Cyclic { remaining: 3 });
//! assert!(order.is_cyclic(1) && order.is_cyclic(2));
//! assert!(!order.is_cyclic(3));
//! ```

mod graph;
pub mod intern;
mod order;
mod scratch;
mod set;
pub mod trace;

pub use graph::DependencyGraph;
pub use intern::{InternId, Interner};
pub use order::{EvaluationOrder, OrderCompletion};
pub use scratch::TraversalScratch;
pub use set::PendingSet;
