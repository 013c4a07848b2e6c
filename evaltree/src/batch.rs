// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change batches: everything that happened between two passes.

use evaltree_graph::PendingSet;
use serde_json::Value as JsonValue;

use crate::entity::{Entity, EntityConfig, EntityRecord};
use crate::path;

/// A change to the set of entities or to an entity's shape.
#[derive(Clone, Debug, PartialEq)]
pub enum StructuralChange {
    /// Add an entity, or replace the one with the same name.
    Upsert(EntityRecord),
    /// Remove the named entity.
    Remove(String),
}

impl StructuralChange {
    /// The entity this change is about.
    #[must_use]
    pub fn entity(&self) -> &str {
        match self {
            Self::Upsert(record) => record.name(),
            Self::Remove(name) => name,
        }
    }
}

/// Changes collected for one evaluation pass.
///
/// Structural changes apply first, in the order they were added. Raw value
/// writes apply next, then the pass runs from every touched path plus the
/// paths marked as changed.
///
/// ```
/// use evaltree::ChangeBatch;
/// use serde_json::json;
///
/// let batch = ChangeBatch::new()
///     .set_value("Input1.text", json!("world"))
///     .mark_changed("Input1.text");
/// assert!(!batch.is_empty());
/// assert!(!batch.has_structural_changes());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ChangeBatch {
    pub(crate) structural: Vec<StructuralChange>,
    pub(crate) values: Vec<(String, JsonValue)>,
    pub(crate) changed: PendingSet<String>,
    pub(crate) forced: PendingSet<String>,
    pub(crate) full: bool,
}

impl ChangeBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entity.
    #[must_use]
    pub fn upsert_entity(mut self, config: EntityConfig, entity: Entity) -> Self {
        self.structural
            .push(StructuralChange::Upsert(EntityRecord::new(config, entity)));
        self
    }

    /// Removes an entity.
    #[must_use]
    pub fn remove_entity(mut self, name: impl Into<String>) -> Self {
        self.structural.push(StructuralChange::Remove(name.into()));
        self
    }

    /// Writes a raw value. A later write to the same path wins.
    ///
    /// Writing a value of a different shape (a scalar where an object was,
    /// or the reverse) is a structural change of the owning entity.
    #[must_use]
    pub fn set_value(mut self, path: impl Into<String>, value: JsonValue) -> Self {
        let path = path.into();
        self.values.retain(|(p, _)| *p != path);
        self.values.push((path, value));
        self
    }

    /// Marks a path as changed without writing it.
    #[must_use]
    pub fn mark_changed(mut self, path: impl Into<String>) -> Self {
        self.changed.mark(path.into());
        self
    }

    /// Asks for `path` to be sent to the consumer even if its value did not
    /// change.
    #[must_use]
    pub fn force_update(mut self, path: impl Into<String>) -> Self {
        self.forced.mark(path.into());
        self
    }

    /// Asks for every path to be evaluated, not only the affected ones.
    #[must_use]
    pub fn evaluate_all(mut self) -> Self {
        self.full = true;
        self
    }

    /// Appends `later` to this batch.
    ///
    /// The result behaves like applying both in turn. Structural changes keep
    /// their relative order, and for raw values the later write wins. Writes
    /// into an entity that `later` replaces or removes are dropped, as are
    /// marks on entities it removes.
    pub fn merge(&mut self, later: Self) {
        for change in &later.structural {
            let name = change.entity();
            self.values.retain(|(p, _)| path::entity_of(p) != name);
            if let StructuralChange::Remove(_) = change {
                self.changed.retain(|p| path::entity_of(p) != name);
                self.forced.retain(|p| path::entity_of(p) != name);
            }
        }
        self.structural.extend(later.structural);
        for (path, value) in later.values {
            self.values.retain(|(p, _)| *p != path);
            self.values.push((path, value));
        }
        self.changed.extend(later.changed.iter().cloned());
        self.forced.extend(later.forced.iter().cloned());
        self.full |= later.full;
    }

    /// Returns `true` if the batch asks for nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.structural.is_empty()
            && self.values.is_empty()
            && self.changed.is_empty()
            && self.forced.is_empty()
            && !self.full
    }

    /// Returns `true` if the batch adds, removes or replaces entities.
    #[must_use]
    pub fn has_structural_changes(&self) -> bool {
        !self.structural.is_empty()
    }

    /// The structural changes, in order.
    #[must_use]
    pub fn structural_changes(&self) -> &[StructuralChange] {
        &self.structural
    }

    /// Paths marked as changed, in first-marked order.
    pub fn changed_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.changed.iter().map(String::as_str)
    }

    /// Paths forced into the consumer update, in first-marked order.
    pub fn forced_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.forced.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use serde_json::json;

    #[test]
    fn later_value_writes_win() {
        let mut batch = ChangeBatch::new()
            .set_value("A.x", json!(1))
            .set_value("A.y", json!(1));
        batch.merge(ChangeBatch::new().set_value("A.x", json!(2)));
        assert_eq!(
            batch.values,
            vec![("A.y".to_owned(), json!(1)), ("A.x".to_owned(), json!(2))]
        );
    }

    #[test]
    fn merge_keeps_structural_order_and_dedups_marks() {
        let config = EntityConfig::new("A", EntityKind::WIDGET);
        let mut batch = ChangeBatch::new()
            .upsert_entity(config, Entity::default())
            .mark_changed("A.x");
        batch.merge(
            ChangeBatch::new()
                .remove_entity("A")
                .mark_changed("A.x")
                .mark_changed("B.y"),
        );
        assert!(matches!(batch.structural[0], StructuralChange::Upsert(_)));
        assert_eq!(batch.structural[1], StructuralChange::Remove("A".into()));
        assert_eq!(batch.changed_paths().collect::<Vec<_>>(), vec!["A.x", "B.y"]);
    }

    #[test]
    fn emptiness() {
        assert!(ChangeBatch::new().is_empty());
        assert!(!ChangeBatch::new().evaluate_all().is_empty());
        assert!(!ChangeBatch::new().force_update("A.x").is_empty());
    }

    #[test]
    fn merge_drops_writes_superseded_by_later_structure() {
        let mut batch = ChangeBatch::new()
            .set_value("A.x", json!(1))
            .set_value("B.x", json!(1))
            .mark_changed("A.y")
            .force_update("B.x");
        batch.merge(
            ChangeBatch::new()
                .remove_entity("A")
                .upsert_entity(EntityConfig::new("B", EntityKind::WIDGET), Entity::default()),
        );
        assert!(batch.values.is_empty());
        assert_eq!(batch.changed_paths().count(), 0);
        assert_eq!(batch.forced_paths().collect::<Vec<_>>(), vec!["B.x"]);
        assert_eq!(batch.structural[0].entity(), "A");
    }
}
