// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entities and their configuration.
//!
//! An [`Entity`] is the raw record the author edits: a JSON object whose
//! nested objects are walked into property paths. An [`EntityConfig`] says
//! which of those properties hold bindings, which internal wiring the
//! entity declares, and which values are bulk data.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::path;

/// Kind tag of an entity, used to pick its dependency extractor.
///
/// The common kinds are associated constants; any other tag can be created
/// with [`EntityKind::new`] and paired with a custom extractor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(Cow<'static, str>);

impl EntityKind {
    /// A UI widget.
    pub const WIDGET: Self = Self(Cow::Borrowed("WIDGET"));
    /// A query or API action.
    pub const ACTION: Self = Self(Cow::Borrowed("ACTION"));
    /// A script collection: variables and functions written as code.
    pub const JS_ACTION: Self = Self(Cow::Borrowed("JSACTION"));
    /// The inputs of a reusable module.
    pub const MODULE_INPUT: Self = Self(Cow::Borrowed("MODULE_INPUT"));
    /// An instance of a reusable module.
    pub const MODULE_INSTANCE: Self = Self(Cow::Borrowed("MODULE_INSTANCE"));

    /// Creates a kind tag.
    #[must_use]
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityKind {
    fn default() -> Self {
        Self::WIDGET
    }
}

/// How bindings are written in an entity's dynamic properties.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSyntax {
    /// Text with `{{ expression }}` segments.
    #[default]
    Template,
    /// The whole value is code.
    Script,
}

/// What a module instance wraps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// A parameterized query.
    Query,
    /// A script module.
    Js,
    /// A UI module.
    Ui,
}

/// Static configuration describing how to read an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityConfig {
    /// Unique entity name; the first segment of all its paths.
    pub name: String,
    /// Kind tag.
    pub kind: EntityKind,
    /// Properties (relative paths) that currently contain bindings.
    pub dynamic_binding_path_list: BTreeSet<String>,
    /// Properties (relative paths) that are allowed to contain bindings.
    pub binding_paths: BTreeSet<String>,
    /// Internal wiring declared by the entity, keyed by relative property.
    ///
    /// Targets are resolved relative to the entity first, then as full paths.
    pub dependency_map: BTreeMap<String, Vec<String>>,
    /// Properties (relative paths) holding bulk data compared by reference.
    pub opaque_paths: BTreeSet<String>,
    /// How bindings are written.
    pub binding_syntax: BindingSyntax,
    /// For module instances: what the module wraps.
    pub module_type: Option<ModuleType>,
}

impl EntityConfig {
    /// Creates a configuration with no bindings.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Flags `property` as holding a binding.
    #[must_use]
    pub fn with_dynamic_path(mut self, property: impl Into<String>) -> Self {
        self.dynamic_binding_path_list.insert(property.into());
        self
    }

    /// Declares that `property` reads `targets`.
    #[must_use]
    pub fn with_declared_dependency<I, S>(mut self, property: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_map
            .entry(property.into())
            .or_default()
            .extend(targets.into_iter().map(Into::into));
        self
    }

    /// Marks `property` as bulk data.
    #[must_use]
    pub fn with_opaque_path(mut self, property: impl Into<String>) -> Self {
        self.opaque_paths.insert(property.into());
        self
    }

    /// Sets the binding syntax.
    #[must_use]
    pub fn with_binding_syntax(mut self, syntax: BindingSyntax) -> Self {
        self.binding_syntax = syntax;
        self
    }

    /// Sets the module type.
    #[must_use]
    pub fn with_module_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = Some(module_type);
        self
    }

    /// Returns `true` if `property` may hold a binding.
    #[must_use]
    pub fn is_dynamic_path(&self, property: &str) -> bool {
        self.binding_paths.contains(property) || self.dynamic_binding_path_list.contains(property)
    }

    /// Returns `true` if `property` holds bulk data.
    #[must_use]
    pub fn is_opaque_path(&self, property: &str) -> bool {
        self.opaque_paths.contains(property)
    }
}

/// The raw, unevaluated record of an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    properties: Map<String, JsonValue>,
}

impl Entity {
    /// Creates an entity from its top-level properties.
    #[must_use]
    pub fn new(properties: Map<String, JsonValue>) -> Self {
        Self { properties }
    }

    /// Creates an entity from a JSON object. Non-objects yield an empty entity.
    #[must_use]
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(properties) => Self { properties },
            _ => Self::default(),
        }
    }

    /// Returns the top-level properties.
    #[must_use]
    pub fn properties(&self) -> &Map<String, JsonValue> {
        &self.properties
    }

    /// Looks up a relative property path.
    #[must_use]
    pub fn property(&self, property: &str) -> Option<&JsonValue> {
        let mut segments = path::segments(property);
        let mut current = self.properties.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Sets a relative property path, creating intermediate objects.
    ///
    /// Returns the previous value. Intermediate non-object values are
    /// replaced by objects.
    pub fn set(&mut self, property: &str, value: JsonValue) -> Option<JsonValue> {
        let (parents, last) = match property.rsplit_once(path::SEPARATOR) {
            Some((parents, last)) => (Some(parents), last),
            None => (None, property),
        };
        let mut map = &mut self.properties;
        for segment in parents.into_iter().flat_map(path::segments) {
            let slot = map
                .entry(segment.to_owned())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !slot.is_object() {
                *slot = JsonValue::Object(Map::new());
            }
            map = slot.as_object_mut()?;
        }
        map.insert(last.to_owned(), value)
    }

    /// Lists every path of the entity named `name`, parents before children.
    ///
    /// The entity path itself comes first. A non-empty object is a composite
    /// path; everything else (scalars, arrays, empty objects) is a leaf.
    #[must_use]
    pub fn paths(&self, name: &str) -> Vec<EntityPath> {
        let mut out = vec![EntityPath {
            path: name.to_owned(),
            is_leaf: false,
        }];
        walk(&self.properties, name, &mut out);
        out
    }

    /// Lists only the leaf paths of the entity named `name`.
    #[must_use]
    pub fn leaf_paths(&self, name: &str) -> Vec<String> {
        self.paths(name)
            .into_iter()
            .filter(|p| p.is_leaf)
            .map(|p| p.path)
            .collect()
    }
}

/// One path of an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityPath {
    /// The full path.
    pub path: String,
    /// Whether the path holds a value of its own rather than children.
    pub is_leaf: bool,
}

/// Returns `true` if `value` is walked into rather than stored.
pub(crate) fn is_composite(value: &JsonValue) -> bool {
    value.as_object().is_some_and(|m| !m.is_empty())
}

fn walk(map: &Map<String, JsonValue>, prefix: &str, out: &mut Vec<EntityPath>) {
    for (key, value) in map {
        let full = path::join(prefix, key);
        let composite = is_composite(value);
        out.push(EntityPath {
            path: full.clone(),
            is_leaf: !composite,
        });
        if let JsonValue::Object(children) = value {
            walk(children, &full, out);
        }
    }
}

/// An entity together with its configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    /// How to read the entity.
    pub config: EntityConfig,
    /// The raw values.
    pub entity: Entity,
}

impl EntityRecord {
    /// Pairs a configuration with its entity.
    #[must_use]
    pub fn new(config: EntityConfig, entity: Entity) -> Self {
        Self { config, entity }
    }

    /// The entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }
}
