// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaltree: incremental evaluation of entity trees with embedded bindings.
//!
//! An application is a tree of named entities (widgets, queries, script
//! collections, module inputs and instances). Some of their properties are
//! code: a `{{ }}` template such as `"Hello {{Input1.text}}"`, or a whole
//! script expression. This crate keeps the evaluated value of every property
//! current as the tree changes, re-running only what a change can reach.
//!
//! - **Entities** ([`Entity`], [`EntityConfig`], [`EntityTree`]): raw values
//!   plus the configuration that says which paths hold code, which
//!   dependencies are declared, and which values are bulk data.
//! - **Extraction** ([`extract`]): per-kind [`DependencyExtractor`]s turn an
//!   entity into path-to-path edges.
//! - **Graph** ([`PathGraph`]): the dependency graph over full paths and its
//!   evaluation order, built on [`evaltree_graph`].
//! - **Expressions** ([`expr`]): a pluggable [`ExpressionEngine`] with a
//!   bundled interpreter, run under a step and time [`Budget`].
//! - **Evaluation** ([`Evaluator`]): applies [`ChangeBatch`]es and runs
//!   passes into a [`Snapshot`].
//! - **Delivery** ([`Scheduler`], [`UpdateBatch`], [`PatchSink`]): coalesces
//!   submissions and hands each pass's [`Patch`]es and errors to a consumer.
//!
//! ## Quick Start
//!
//! ```rust
//! use evaltree::{ChangeBatch, Entity, EntityConfig, EntityKind, EntityRecord, Evaluator, PatchOp};
//! use serde_json::json;
//!
//! let mut evaluator = Evaluator::default();
//! let first = evaluator
//!     .load([
//!         EntityRecord::new(
//!             EntityConfig::new("Input1", EntityKind::WIDGET),
//!             Entity::from_json(json!({ "text": "hello" })),
//!         ),
//!         EntityRecord::new(
//!             EntityConfig::new("Text1", EntityKind::WIDGET).with_dynamic_path("text"),
//!             Entity::from_json(json!({ "text": "{{Input1.text}}" })),
//!         ),
//!     ])
//!     .unwrap();
//! assert!(first.is_first_tree);
//!
//! let update = evaluator
//!     .apply(ChangeBatch::new().set_value("Input1.text", json!("world")))
//!     .unwrap();
//! let changed: Vec<&str> = update.patches.iter().map(|p| p.path.as_str()).collect();
//! assert_eq!(changed, vec!["Input1.text", "Text1.text"]);
//! assert!(update.patches.iter().all(|p| p.op == PatchOp::Set));
//! assert_eq!(evaluator.value("Text1.text").unwrap().to_json(), json!("world"));
//! ```
//!
//! ## Cycles and errors
//!
//! A pass never fails because of what the entities contain. Cycle members
//! are evaluated once and get a cycle error; expressions that fail to parse,
//! fail at runtime or run out of budget get an error and keep their previous
//! value. Errors are reported per path in [`UpdateBatch::errors`].
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]: structural changes and pass summaries
//! at `debug`, each evaluated path at `trace`, and degraded dependency maps
//! at `warn`. Install any subscriber to see them.

mod batch;
pub mod binding;
mod config;
mod diagnostics;
mod diff;
mod entity;
mod error;
mod evaluator;
pub mod expr;
pub mod extract;
mod graph;
pub mod path;
mod scheduler;
mod snapshot;
mod transport;
mod tree;
mod value;

pub use batch::{ChangeBatch, StructuralChange};
pub use config::{EvaluatorConfig, EvaluatorConfigBuilder, IntegrityHandling};
pub use diagnostics::Diagnostics;
pub use diff::{Patch, PatchOp, diff};
pub use entity::{
    BindingSyntax, Entity, EntityConfig, EntityKind, EntityPath, EntityRecord, ModuleType,
};
pub use error::{EvalError, EvalResult, ExecutionError, PathError, PathErrorKind};
pub use evaluator::{EvaluationResult, Evaluator};
pub use expr::{Budget, ExpressionEngine, Scope, SimpleEngine};
pub use extract::{DependencyExtractor, DependencyMap, ExtractorRegistry};
pub use graph::PathGraph;
pub use scheduler::Scheduler;
pub use snapshot::Snapshot;
pub use transport::{FnSink, PatchSink, UpdateBatch};
pub use tree::{EntityTree, KnownPaths};
pub use value::Value;
