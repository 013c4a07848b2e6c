// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The entity tree: every entity record, in registration order, plus the set
//! of paths that currently exist.

use hashbrown::{HashMap, HashSet};

use crate::entity::{Entity, EntityConfig, EntityRecord};
use crate::error::{EvalError, EvalResult};
use crate::path;

/// All paths that currently exist in the entity tree, composite and leaf.
///
/// Reference resolution only ever targets paths in this set.
#[derive(Clone, Debug, Default)]
pub struct KnownPaths {
    paths: HashSet<String>,
}

impl KnownPaths {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `path` exists.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Number of known paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if no path is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Adds every path of `entity`.
    pub fn insert_entity(&mut self, name: &str, entity: &Entity) {
        self.paths
            .extend(entity.paths(name).into_iter().map(|p| p.path));
    }

    /// Removes every path of `entity`.
    pub fn remove_entity(&mut self, name: &str, entity: &Entity) {
        for p in entity.paths(name) {
            self.paths.remove(&p.path);
        }
    }

    /// Returns the longest prefix of `chain` that is a known path.
    ///
    /// `Input1.text.length` resolves to `Input1.text` when `Input1.text` is a
    /// leaf.
    #[must_use]
    pub fn resolve<'a>(&self, chain: &'a str) -> Option<&'a str> {
        path::prefixes(chain).find(|p| self.contains(p))
    }
}

impl<S: Into<String>> FromIterator<S> for KnownPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Entity records keyed by name, in registration order.
#[derive(Clone, Debug, Default)]
pub struct EntityTree {
    order: Vec<String>,
    records: HashMap<String, EntityRecord>,
}

impl EntityTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from records, rejecting duplicate or malformed names.
    pub fn from_records(records: impl IntoIterator<Item = EntityRecord>) -> EvalResult<Self> {
        let mut tree = Self::new();
        for record in records {
            validate_name(record.name())?;
            if tree.contains(record.name()) {
                return Err(EvalError::DuplicateEntity(record.name().to_owned()));
            }
            tree.upsert(record);
        }
        Ok(tree)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the tree has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if an entity named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Returns the record of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityRecord> {
        self.records.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut EntityRecord> {
        self.records.get_mut(name)
    }

    /// Returns the configuration of `name`.
    #[must_use]
    pub fn config(&self, name: &str) -> Option<&EntityConfig> {
        self.get(name).map(|r| &r.config)
    }

    /// Inserts or replaces a record, returning the replaced one.
    ///
    /// A replaced entity keeps its registration position.
    pub fn upsert(&mut self, record: EntityRecord) -> Option<EntityRecord> {
        let name = record.name().to_owned();
        let old = self.records.insert(name.clone(), record);
        if old.is_none() {
            self.order.push(name);
        }
        old
    }

    /// Removes the record of `name`.
    pub fn remove(&mut self, name: &str) -> Option<EntityRecord> {
        let old = self.records.remove(name)?;
        self.order.retain(|n| n != name);
        Some(old)
    }

    /// Iterates over entity names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    /// Iterates over records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> + '_ {
        self.order.iter().filter_map(|n| self.records.get(n))
    }

    /// Collects every path of every entity.
    #[must_use]
    pub fn known_paths(&self) -> KnownPaths {
        let mut known = KnownPaths::new();
        for record in self.iter() {
            known.insert_entity(record.name(), &record.entity);
        }
        known
    }

    /// Returns the raw value stored at a full leaf path.
    #[must_use]
    pub fn raw_value(&self, full: &str) -> Option<&serde_json::Value> {
        let (entity, property) = path::split(full);
        if property.is_empty() {
            return None;
        }
        self.get(entity)?.entity.property(property)
    }
}

/// Checks that `name` can serve as the first segment of a path.
pub(crate) fn validate_name(name: &str) -> EvalResult<()> {
    if path::is_valid_entity_name(name) {
        Ok(())
    } else {
        Err(EvalError::InvalidPath(name.to_owned()))
    }
}
