// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The evaluator: entity tree, dependency graph and snapshot kept in step.
//!
//! Every call that changes the tree goes through [`Evaluator::apply`]. A
//! batch is validated before anything is touched, then applied in three
//! steps:
//!
//! 1. Structural changes update the tree, the known paths and the raw
//!    values, and queue entities whose dependencies must be re-extracted.
//! 2. Queued entities are re-extracted and their nodes in the graph
//!    replaced.
//! 3. One pass runs over the affected order, and the values it changed are
//!    diffed against what they were before the batch.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use evaltree_graph::{InternId, PendingSet};
use hashbrown::{HashMap, HashSet};
use serde_json::Value as JsonValue;
use smallvec::SmallVec;

use crate::batch::{ChangeBatch, StructuralChange};
use crate::binding::{self, push_unique};
use crate::config::EvaluatorConfig;
use crate::diagnostics::Diagnostics;
use crate::diff::{Patch, diff};
use crate::entity::{self, BindingSyntax, EntityKind, EntityRecord};
use crate::error::{EvalError, EvalResult, PathError, PathErrorKind};
use crate::expr::{Budget, ExpressionEngine, Scope, SimpleEngine, evaluate_template};
use crate::extract::{DependencyExtractor, DependencyMap, ExtractorRegistry, validate_integrity};
use crate::graph::PathGraph;
use crate::path::{self, PropertyPath};
use crate::snapshot::Snapshot;
use crate::transport::UpdateBatch;
use crate::tree::{EntityTree, KnownPaths, validate_name};
use crate::value::Value;

/// Entity names an entity's bindings and declarations refer to.
type Roots = SmallVec<[String; 4]>;

/// What one pass did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationResult {
    /// Leaf paths whose value changed, in evaluation order.
    pub updated_paths: Vec<String>,
    /// Errors of this pass, by path.
    pub errors: BTreeMap<String, Vec<PathError>>,
    /// Leaf paths that ran, in the order they ran.
    pub evaluation_order: Vec<String>,
    /// Cycle members met by this pass.
    pub cyclic_paths: Vec<String>,
    /// Paths that ran and ended up `undefined`.
    pub undefined_paths: Vec<String>,
    /// Timing and size of the pass.
    pub diagnostics: Diagnostics,
}

/// Incremental evaluator over a tree of entities.
///
/// ```
/// use evaltree::{ChangeBatch, Entity, EntityConfig, EntityKind, EntityRecord, Evaluator};
/// use serde_json::json;
///
/// let mut evaluator = Evaluator::default();
/// evaluator
///     .load([
///         EntityRecord::new(
///             EntityConfig::new("Input1", EntityKind::WIDGET),
///             Entity::from_json(json!({ "text": "hello" })),
///         ),
///         EntityRecord::new(
///             EntityConfig::new("Text1", EntityKind::WIDGET).with_dynamic_path("text"),
///             Entity::from_json(json!({ "text": "{{Input1.text}} world" })),
///         ),
///     ])
///     .unwrap();
/// assert_eq!(evaluator.value("Text1.text").unwrap().to_json(), json!("hello world"));
///
/// let update = evaluator
///     .apply(ChangeBatch::new().set_value("Input1.text", json!("goodbye")))
///     .unwrap();
/// assert_eq!(update.evaluation_order, vec!["Input1.text", "Text1.text"]);
/// assert_eq!(evaluator.value("Text1.text").unwrap().to_json(), json!("goodbye world"));
/// ```
#[derive(Debug)]
pub struct Evaluator {
    config: EvaluatorConfig,
    engine: Box<dyn ExpressionEngine>,
    extractors: ExtractorRegistry,
    tree: EntityTree,
    known: KnownPaths,
    graph: PathGraph,
    snapshot: Snapshot,
    /// One shared allocation per bulk-data path, replaced only when the raw
    /// value is written.
    opaque: HashMap<String, Arc<JsonValue>>,
    /// Entity name to the entities whose bindings name it.
    readers: HashMap<String, BTreeSet<String>>,
    /// Entity name to the entity names its bindings name.
    reads: HashMap<String, Roots>,
    evaluated_once: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}

impl Evaluator {
    /// Creates an empty evaluator using [`SimpleEngine`] and the bundled
    /// extractors.
    #[must_use]
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            engine: Box::new(SimpleEngine),
            extractors: ExtractorRegistry::with_defaults(),
            tree: EntityTree::new(),
            known: KnownPaths::new(),
            graph: PathGraph::new(),
            snapshot: Snapshot::new(),
            opaque: HashMap::new(),
            readers: HashMap::new(),
            reads: HashMap::new(),
            evaluated_once: false,
        }
    }

    /// Replaces the expression engine.
    #[must_use]
    pub fn with_engine(mut self, engine: impl ExpressionEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    /// Replaces the whole extractor registry.
    #[must_use]
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Sets the extractor used for entities of `kind`.
    #[must_use]
    pub fn with_extractor(
        mut self,
        kind: EntityKind,
        extractor: impl DependencyExtractor + 'static,
    ) -> Self {
        self.extractors.register(kind, extractor);
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// The entity tree.
    #[must_use]
    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    /// Every path that currently exists.
    #[must_use]
    pub fn known_paths(&self) -> &KnownPaths {
        &self.known
    }

    /// The evaluated values.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Returns the evaluated value of `path`, assembling composites.
    #[must_use]
    pub fn value(&self, path: &str) -> Option<Value> {
        self.snapshot.assemble(path)
    }

    /// Replaces the whole tree and runs a full pass.
    ///
    /// Entities not in `records` are removed. The returned batch is marked as
    /// the first over a fresh tree and carries every leaf value.
    pub fn load(
        &mut self,
        records: impl IntoIterator<Item = EntityRecord>,
    ) -> EvalResult<UpdateBatch> {
        let records: Vec<EntityRecord> = records.into_iter().collect();
        let stale: Vec<String> = {
            let mut names: HashSet<&str> = HashSet::with_capacity(records.len());
            for record in &records {
                validate_name(record.name())?;
                if !names.insert(record.name()) {
                    return Err(EvalError::DuplicateEntity(record.name().to_owned()));
                }
            }
            self.tree
                .names()
                .filter(|name| !names.contains(name))
                .map(str::to_owned)
                .collect()
        };

        let mut batch = ChangeBatch::new().evaluate_all();
        batch
            .structural
            .extend(stale.into_iter().map(StructuralChange::Remove));
        batch
            .structural
            .extend(records.into_iter().map(StructuralChange::Upsert));
        self.evaluated_once = false;
        self.apply(batch)
    }

    /// Applies a batch of changes and runs one pass.
    ///
    /// Nothing is modified if the batch names an unknown entity or path.
    pub fn apply(&mut self, batch: ChangeBatch) -> EvalResult<UpdateBatch> {
        self.validate(&batch)?;
        if self.tree.is_empty() && !batch.has_structural_changes() {
            return Ok(UpdateBatch::empty());
        }
        let ChangeBatch {
            structural,
            values,
            changed,
            forced,
            full,
        } = batch;

        let mut work = Work::default();
        for change in structural {
            match change {
                StructuralChange::Upsert(record) => self.upsert_entity(record, &mut work),
                StructuralChange::Remove(name) => self.remove_entity(&name, &mut work),
            }
        }
        for (path, value) in values {
            self.write_value(&path, value, &mut work);
        }
        for name in work.rebuild.drain() {
            self.rebuild_entity(&name, &mut work)?;
        }
        work.roots.extend(changed.iter().cloned());

        let is_first_tree = !self.evaluated_once;
        let roots = (!full && !is_first_tree).then_some(&work.roots);
        let result = self.run_pass(roots, &mut work.previous);
        self.evaluated_once = true;

        let Work {
            mut removed,
            mut previous,
            ..
        } = work;
        let mut seen = HashSet::new();
        removed.retain(|p| !self.snapshot.contains(p) && seen.insert(p.clone()));
        if is_first_tree {
            // The consumer has nothing yet: every surviving leaf is new to it.
            let mut base = Snapshot::new();
            for path in &removed {
                if let Some(old) = previous.remove(path) {
                    base.insert(path.clone(), old);
                }
            }
            previous = base;
        }

        let diff_paths = removed
            .iter()
            .chain(&result.evaluation_order)
            .chain(changed.iter())
            .map(String::as_str);
        let mut patches = diff(&previous, &self.snapshot, diff_paths);
        for path in forced.iter() {
            if patches.iter().any(|p| p.path == *path) {
                continue;
            }
            match self.snapshot.get(path) {
                Some(value) => patches.push(Patch::set(path.clone(), value.clone())),
                None => tracing::debug!(path = %path, "forced path has no value"),
            }
        }

        Ok(UpdateBatch {
            patches,
            errors: result.errors,
            evaluation_order: result.evaluation_order,
            cyclic_paths: result.cyclic_paths,
            removed_paths: removed,
            undefined_paths: result.undefined_paths,
            is_first_tree,
            diagnostics: result.diagnostics,
        })
    }

    /// Re-evaluates everything that transitively reads `changed`.
    ///
    /// Every entry of `changed` must be a path of the tree.
    pub fn evaluate(&mut self, changed: &[&str]) -> EvalResult<EvaluationResult> {
        if let Some(unknown) = changed.iter().find(|p| !self.graph.contains(p)) {
            return Err(EvalError::UnknownPath((*unknown).to_owned()));
        }
        let mut roots = PendingSet::new();
        roots.extend(changed.iter().map(|p| (*p).to_owned()));
        let mut previous = Snapshot::new();
        let result = self.run_pass(Some(&roots), &mut previous);
        Ok(result)
    }

    /// Re-evaluates every path.
    pub fn evaluate_all(&mut self) -> EvaluationResult {
        let mut previous = Snapshot::new();
        let result = self.run_pass(None, &mut previous);
        self.evaluated_once = true;
        result
    }

    /// The full evaluation order.
    pub fn evaluation_order(&mut self) -> Vec<String> {
        self.graph.evaluation_order()
    }

    /// The order a change to `changed` would evaluate in, without running it.
    pub fn affected_order(&mut self, changed: &[&str]) -> EvalResult<Vec<String>> {
        let mut ids = Vec::with_capacity(changed.len());
        for path in changed {
            match self.graph.id(path).filter(|_| self.graph.contains(path)) {
                Some(id) => ids.push(id),
                None => return Err(EvalError::UnknownPath((*path).to_owned())),
            }
        }
        let affected = self.graph.affected(ids);
        Ok(affected
            .into_iter()
            .map(|id| self.graph.path(id).to_owned())
            .collect())
    }

    /// Every path with its direct dependencies.
    #[must_use]
    pub fn dependency_map(&self) -> DependencyMap {
        self.graph.dependency_map()
    }

    /// The paths `path` reads directly.
    #[must_use]
    pub fn dependencies(&self, path: &str) -> Vec<String> {
        self.graph.dependencies(path)
    }

    /// The paths that read `path` directly.
    #[must_use]
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.graph.dependents(path)
    }

    /// Members of dependency cycles.
    pub fn cyclic_paths(&mut self) -> Vec<String> {
        self.graph.cyclic_paths()
    }

    /// One chain of reads leading from `changed` to `target`.
    pub fn explain(&mut self, changed: &[&str], target: &str) -> Option<Vec<String>> {
        self.graph.explain(changed, target)
    }

    fn validate(&self, batch: &ChangeBatch) -> EvalResult<()> {
        self.validate_all(&[batch])
    }

    /// Checks `batches` as if they were applied one after another, without
    /// changing anything.
    pub(crate) fn validate_all(&self, batches: &[&ChangeBatch]) -> EvalResult<()> {
        let mut names: HashSet<&str> = self.tree.names().collect();
        let mut upserted: HashSet<&str> = HashSet::new();
        let mut written: HashSet<&str> = HashSet::new();
        for batch in batches {
            for change in &batch.structural {
                let name = change.entity();
                match change {
                    StructuralChange::Upsert(_) => {
                        validate_name(name)?;
                        names.insert(name);
                        upserted.insert(name);
                    }
                    StructuralChange::Remove(_) => {
                        if !names.remove(name) {
                            return Err(EvalError::UnknownEntity(name.to_owned()));
                        }
                        upserted.remove(name);
                    }
                }
                written.retain(|p| path::entity_of(p) != name);
            }
            for (full, _) in &batch.values {
                let parsed = PropertyPath::parse(full)?;
                if parsed.is_entity() {
                    return Err(EvalError::InvalidPath(full.clone()));
                }
                if !names.contains(parsed.entity) {
                    return Err(EvalError::UnknownEntity(parsed.entity.to_owned()));
                }
                written.insert(full.as_str());
            }
            for full in batch.changed.iter() {
                let entity = path::entity_of(full);
                let exists = names.contains(entity)
                    && (upserted.contains(entity)
                        || self.known.contains(full)
                        || written.contains(full.as_str()));
                if !exists {
                    return Err(EvalError::UnknownPath(full.clone()));
                }
            }
        }
        Ok(())
    }

    fn upsert_entity(&mut self, record: EntityRecord, work: &mut Work) {
        let name = record.name().to_owned();
        let leaves = record.entity.leaf_paths(&name);
        if let Some(old) = self.tree.get(&name) {
            let fresh: HashSet<&str> = leaves.iter().map(String::as_str).collect();
            let stale: Vec<String> = old
                .entity
                .leaf_paths(&name)
                .into_iter()
                .filter(|p| !fresh.contains(p.as_str()))
                .collect();
            self.known.remove_entity(&name, &old.entity);
            for leaf in stale {
                work.drop_leaf(&mut self.snapshot, leaf);
            }
        }
        self.known.insert_entity(&name, &record.entity);
        self.cache_opaque(&record);
        self.tree.upsert(record);
        work.roots.extend(leaves);
        work.rebuild.mark(name.clone());
        self.mark_readers(&name, work);
        tracing::debug!(entity = %name, "entity upserted");
    }

    fn remove_entity(&mut self, name: &str, work: &mut Work) {
        let Some(record) = self.tree.remove(name) else {
            return;
        };
        self.known.remove_entity(name, &record.entity);
        for leaf in record.entity.leaf_paths(name) {
            work.drop_leaf(&mut self.snapshot, leaf);
        }
        self.graph.remove(name);
        self.opaque.retain(|p, _| path::entity_of(p) != name);
        self.set_reads(name, Roots::new());
        self.mark_readers(name, work);
        tracing::debug!(entity = name, "entity removed");
    }

    fn write_value(&mut self, full: &str, value: JsonValue, work: &mut Work) {
        let (name, property) = path::split(full);
        let Some(record) = self.tree.get_mut(name) else {
            return;
        };
        let same_shape = !entity::is_composite(&value)
            && record
                .entity
                .property(property)
                .is_some_and(|old| !entity::is_composite(old));
        if !same_shape {
            let mut reshaped = record.clone();
            reshaped.entity.set(property, value);
            self.upsert_entity(reshaped, work);
            return;
        }
        if record.config.is_opaque_path(property) {
            self.opaque
                .insert(full.to_owned(), Arc::new(value.clone()));
        }
        let rewires = record.config.is_dynamic_path(property)
            || record.config.dependency_map.contains_key(property);
        record.entity.set(property, value);
        work.roots.mark(full.to_owned());
        if rewires {
            work.rebuild.mark(name.to_owned());
        }
    }

    fn rebuild_entity(&mut self, name: &str, work: &mut Work) -> EvalResult<()> {
        let Some(record) = self.tree.get(name) else {
            return Ok(());
        };
        let extractor = self.extractors.get(&record.config.kind);
        let mut map = extractor.extract(&record.entity, &record.config, &self.known);
        validate_integrity(name, &mut map, &self.known, self.config.integrity)?;

        let paths = record.entity.paths(name);
        for entry in &paths {
            map.entry(entry.path.clone()).or_default();
            if let Some(parent) = path::parent(&entry.path) {
                push_unique(map.entry(parent.to_owned()).or_default(), &entry.path);
            }
        }
        let roots = referenced_roots(record);

        self.graph.add_or_update(name, &map);
        self.set_reads(name, roots);
        tracing::trace!(entity = name, nodes = map.len(), "dependencies extracted");
        work.roots
            .extend(paths.into_iter().filter(|p| p.is_leaf).map(|p| p.path));
        Ok(())
    }

    fn cache_opaque(&mut self, record: &EntityRecord) {
        let name = record.name();
        self.opaque.retain(|p, _| path::entity_of(p) != name);
        for property in &record.config.opaque_paths {
            if let Some(value) = record
                .entity
                .property(property)
                .filter(|v| !entity::is_composite(v))
            {
                self.opaque
                    .insert(path::join(name, property), Arc::new(value.clone()));
            }
        }
    }

    fn mark_readers(&self, name: &str, work: &mut Work) {
        let Some(readers) = self.readers.get(name) else {
            return;
        };
        for reader in readers {
            if reader != name {
                work.rebuild.mark(reader.clone());
            }
        }
    }

    fn set_reads(&mut self, name: &str, roots: Roots) {
        if let Some(old) = self.reads.remove(name) {
            for root in old {
                if let Some(readers) = self.readers.get_mut(&root) {
                    readers.remove(name);
                    if readers.is_empty() {
                        self.readers.remove(&root);
                    }
                }
            }
        }
        if roots.is_empty() {
            return;
        }
        for root in &roots {
            self.readers
                .entry(root.clone())
                .or_default()
                .insert(name.to_owned());
        }
        self.reads.insert(name.to_owned(), roots);
    }

    fn run_pass(
        &mut self,
        roots: Option<&PendingSet<String>>,
        previous: &mut Snapshot,
    ) -> EvaluationResult {
        let start = Instant::now();
        let affected: Vec<InternId> = match roots {
            None => self.graph.order().as_slice().to_vec(),
            Some(roots) => {
                let ids: Vec<InternId> = roots.iter().filter_map(|p| self.graph.id(p)).collect();
                self.graph.affected(ids)
            }
        };

        let mut result = EvaluationResult::default();
        for &id in &affected {
            let path = self.graph.path(id).to_owned();
            let cyclic = self.graph.is_cyclic(id);
            if cyclic {
                result
                    .errors
                    .entry(path.clone())
                    .or_default()
                    .push(PathError::cycle(&path));
                result.cyclic_paths.push(path.clone());
            }
            if self.evaluate_path(&path, cyclic, previous, &mut result) {
                result.evaluation_order.push(path);
            }
        }
        result.undefined_paths = result
            .evaluation_order
            .iter()
            .filter(|p| self.snapshot.get(p).is_some_and(Value::is_undefined))
            .cloned()
            .collect();
        result.diagnostics = Diagnostics::finish(
            start,
            affected.len(),
            self.graph.len(),
            self.graph.cyclic_len(),
        );
        result
    }

    /// Evaluates one path into the snapshot. Returns `false` for paths that
    /// hold no value of their own.
    fn evaluate_path(
        &mut self,
        path: &str,
        cyclic: bool,
        previous: &mut Snapshot,
        result: &mut EvaluationResult,
    ) -> bool {
        let value = match self.compute(path) {
            Computed::Composite => return false,
            Computed::Missing => {
                if let Some(old) = self.snapshot.remove(path) {
                    capture(previous, path, old);
                }
                return false;
            }
            Computed::Value(value) => value,
            Computed::Failed(error) => {
                if error.kind == PathErrorKind::BudgetExceeded {
                    tracing::warn!(path, "expression ran out of budget");
                } else {
                    tracing::debug!(path, error = %error.message, "evaluation failed");
                }
                let fallback = if self.config.stale_on_error {
                    self.snapshot.get(path).cloned().unwrap_or_default()
                } else {
                    Value::Undefined
                };
                // Cycle members already carry their one error.
                if !cyclic {
                    result.errors.entry(path.to_owned()).or_default().push(error);
                }
                fallback
            }
        };
        let changed = self.snapshot.get(path) != Some(&value);
        if let Some(old) = self.snapshot.insert(path, value) {
            capture(previous, path, old);
        }
        if changed {
            result.updated_paths.push(path.to_owned());
        }
        tracing::trace!(path, changed, "evaluated");
        true
    }

    fn compute(&self, full: &str) -> Computed {
        let (name, property) = path::split(full);
        let Some(record) = self.tree.get(name) else {
            return Computed::Missing;
        };
        if property.is_empty() {
            return Computed::Composite;
        }
        let Some(raw) = record.entity.property(property) else {
            return Computed::Missing;
        };
        if entity::is_composite(raw) {
            return Computed::Composite;
        }
        if record.config.is_dynamic_path(property) {
            if let Some(code) = raw.as_str() {
                let scope = PassScope {
                    snapshot: &self.snapshot,
                    tree: &self.tree,
                };
                let mut budget = Budget::new(self.config.step_budget, self.config.deadline());
                let outcome = match record.config.binding_syntax {
                    BindingSyntax::Template if binding::is_dynamic_value(code) => {
                        evaluate_template(self.engine.as_ref(), code, &scope, &mut budget)
                    }
                    BindingSyntax::Template => Ok(Value::Data(raw.clone())),
                    BindingSyntax::Script => self.engine.evaluate(code, &scope, &mut budget),
                };
                return match outcome {
                    Ok(value) => Computed::Value(value),
                    Err(error) => Computed::Failed(error.into()),
                };
            }
        }
        if let Some(shared) = self.opaque.get(full) {
            return Computed::Value(Value::Opaque(Arc::clone(shared)));
        }
        Computed::Value(Value::Data(raw.clone()))
    }
}

/// Bookkeeping for one batch.
#[derive(Default)]
struct Work {
    /// Paths whose value may have changed.
    roots: PendingSet<String>,
    /// Entities whose dependencies must be re-extracted.
    rebuild: PendingSet<String>,
    /// Leaf paths that stopped existing.
    removed: Vec<String>,
    /// Values from before the batch, for every path the batch touched.
    previous: Snapshot,
}

impl Work {
    fn drop_leaf(&mut self, snapshot: &mut Snapshot, leaf: String) {
        if let Some(old) = snapshot.remove(&leaf) {
            capture(&mut self.previous, &leaf, old);
        }
        self.removed.push(leaf);
    }
}

/// Records the first value a path had within a batch.
fn capture(previous: &mut Snapshot, path: &str, old: Value) {
    if !previous.contains(path) {
        previous.insert(path, old);
    }
}

enum Computed {
    Composite,
    Missing,
    Value(Value),
    Failed(PathError),
}

/// What an expression sees during a pass.
///
/// Names of entities that exist are defined even before any of their
/// paths have a value, so reading one of them yields `undefined`
/// rather than a reference error.
struct PassScope<'a> {
    snapshot: &'a Snapshot,
    tree: &'a EntityTree,
}

impl Scope for PassScope<'_> {
    fn lookup(&self, segments: &[&str]) -> Option<Value> {
        self.snapshot.lookup(segments)
    }

    fn is_defined(&self, root: &str) -> bool {
        self.tree.contains(root)
    }
}

fn referenced_roots(record: &EntityRecord) -> Roots {
    let config = &record.config;
    let mut roots = Roots::new();
    for property in config
        .dynamic_binding_path_list
        .iter()
        .chain(&config.binding_paths)
    {
        if let Some(value) = record.entity.property(property) {
            for chain in binding::referenced_chains(value, config.binding_syntax) {
                push_root(&mut roots, path::entity_of(&chain), record.name());
            }
        }
    }
    // Declared targets resolve inside the entity first.
    for target in config.dependency_map.values().flatten() {
        if record.entity.property(target).is_none() {
            push_root(&mut roots, path::entity_of(target), record.name());
        }
    }
    roots
}

fn push_root(roots: &mut Roots, root: &str, own: &str) {
    if root != own && !roots.iter().any(|r| r == root) {
        roots.push(root.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityConfig};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn widget(name: &str, dynamic: &[&str], value: JsonValue) -> EntityRecord {
        let mut config = EntityConfig::new(name, EntityKind::WIDGET);
        for property in dynamic {
            config = config.with_dynamic_path(*property);
        }
        EntityRecord::new(config, Entity::from_json(value))
    }

    fn loaded(records: Vec<EntityRecord>) -> Evaluator {
        let mut evaluator = Evaluator::default();
        evaluator.load(records).unwrap();
        evaluator
    }

    #[test]
    fn composites_depend_on_their_children() {
        let evaluator = loaded(vec![widget("T", &[], json!({"meta": {"a": 1, "b": 2}}))]);
        assert_eq!(evaluator.dependencies("T"), vec!["T.meta"]);
        assert_eq!(evaluator.dependencies("T.meta"), vec!["T.meta.a", "T.meta.b"]);
    }

    #[test]
    fn whole_entity_reads_follow_any_child() {
        let mut evaluator = loaded(vec![
            widget("A", &[], json!({"x": 1, "y": 2})),
            widget("B", &["all"], json!({"all": "{{A}}"})),
        ]);
        assert_eq!(
            evaluator.value("B.all").unwrap().to_json(),
            json!({"x": 1, "y": 2})
        );
        let update = evaluator
            .apply(ChangeBatch::new().set_value("A.y", json!(3)))
            .unwrap();
        assert_eq!(update.evaluation_order, vec!["A.y", "B.all"]);
        assert_eq!(
            evaluator.value("B.all").unwrap().to_json(),
            json!({"x": 1, "y": 3})
        );
    }

    #[test]
    fn opaque_values_are_shared_until_written() {
        let config = EntityConfig::new("Q", EntityKind::ACTION).with_opaque_path("data");
        let record = EntityRecord::new(config, Entity::from_json(json!({"data": [1, 2, 3], "n": 1})));
        let mut evaluator = loaded(vec![record]);
        let before = evaluator.snapshot().get("Q.data").cloned().unwrap();

        let update = evaluator
            .apply(ChangeBatch::new().set_value("Q.n", json!(2)).mark_changed("Q.data"))
            .unwrap();
        assert!(update.patches.iter().all(|p| p.path != "Q.data"));
        assert_eq!(evaluator.snapshot().get("Q.data"), Some(&before));

        let update = evaluator
            .apply(ChangeBatch::new().set_value("Q.data", json!([1, 2, 3])))
            .unwrap();
        assert_eq!(update.patches.len(), 1);
        assert_ne!(evaluator.snapshot().get("Q.data"), Some(&before));
    }

    #[test]
    fn rewriting_a_binding_rewires_the_graph() {
        let mut evaluator = loaded(vec![
            widget("A", &[], json!({"x": 1, "y": 2})),
            widget("B", &["v"], json!({"v": "{{A.x}}"})),
        ]);
        evaluator
            .apply(ChangeBatch::new().set_value("B.v", json!("{{A.y}}")))
            .unwrap();
        assert_eq!(evaluator.dependencies("B.v"), vec!["A.y"]);
        assert_eq!(evaluator.value("B.v").unwrap().to_json(), json!(2));
    }

    #[test]
    fn reshaping_a_value_replaces_its_paths() {
        let mut evaluator = loaded(vec![widget("A", &[], json!({"x": 1}))]);
        let update = evaluator
            .apply(ChangeBatch::new().set_value("A.x", json!({"inner": true})))
            .unwrap();
        assert_eq!(update.removed_paths, vec!["A.x"]);
        assert!(evaluator.known_paths().contains("A.x.inner"));
        assert_eq!(evaluator.value("A.x.inner").unwrap().to_json(), json!(true));
    }

    #[test]
    fn readers_are_rewired_when_their_target_appears() {
        let mut evaluator = loaded(vec![widget("B", &["v"], json!({"v": "{{A.x}}"}))]);
        assert_eq!(evaluator.value("B.v"), Some(Value::Undefined));
        evaluator
            .apply(ChangeBatch::new().upsert_entity(
                EntityConfig::new("A", EntityKind::WIDGET),
                Entity::from_json(json!({"x": 7})),
            ))
            .unwrap();
        assert_eq!(evaluator.dependencies("B.v"), vec!["A.x"]);
        assert_eq!(evaluator.value("B.v").unwrap().to_json(), json!(7));
    }

    #[test]
    fn invalid_batches_change_nothing() {
        let mut evaluator = loaded(vec![widget("A", &[], json!({"x": 1}))]);
        let err = evaluator
            .apply(
                ChangeBatch::new()
                    .set_value("A.x", json!(2))
                    .mark_changed("A.nope"),
            )
            .unwrap_err();
        assert!(matches!(err, EvalError::UnknownPath(p) if p == "A.nope"));
        assert_eq!(evaluator.value("A.x").unwrap().to_json(), json!(1));

        let err = evaluator
            .apply(ChangeBatch::new().remove_entity("Z"))
            .unwrap_err();
        assert!(matches!(err, EvalError::UnknownEntity(n) if n == "Z"));
    }

    #[test]
    fn reloading_drops_entities_that_are_gone() {
        let mut evaluator = loaded(vec![
            widget("A", &[], json!({"x": 1})),
            widget("B", &["v"], json!({"v": "{{A.x}}"})),
        ]);
        let update = evaluator.load(vec![widget("A", &[], json!({"x": 2}))]).unwrap();
        assert!(update.is_first_tree);
        assert_eq!(update.removed_paths, vec!["B.v"]);
        assert!(!evaluator.tree().contains("B"));
        assert_eq!(evaluator.value("B.v"), None);
        assert_eq!(evaluator.dependents("A.x"), vec!["A"]);
        assert!(evaluator.readers.get("A").is_none());
        assert_eq!(evaluator.value("A.x").unwrap().to_json(), json!(2));
    }

    #[test]
    fn relative_declared_targets_are_not_entity_reads() {
        let query = EntityRecord::new(
            EntityConfig::new("Query1", EntityKind::ACTION)
                .with_declared_dependency("data", ["config.limit", "Input1.value"]),
            Entity::from_json(json!({"data": 1, "config": {"limit": 5}})),
        );
        let evaluator = loaded(vec![widget("Input1", &[], json!({"value": 3})), query]);
        assert_eq!(evaluator.reads["Query1"].to_vec(), vec!["Input1"]);
        assert!(evaluator.readers.get("config").is_none());
        assert_eq!(
            evaluator.dependencies("Query1.data"),
            vec!["Input1.value", "Query1.config.limit"]
        );
    }
}
