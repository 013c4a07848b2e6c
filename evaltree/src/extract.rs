// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency extraction.
//!
//! An extractor reads one entity and reports, for each of its paths, which
//! other paths it reads. Which extractor runs is decided by the entity kind
//! through an [`ExtractorRegistry`]. Every extractor only ever reports
//! targets that exist in the [`KnownPaths`] it is given.

use core::fmt;
use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::binding::{self, push_unique};
use crate::config::IntegrityHandling;
use crate::entity::{Entity, EntityConfig, EntityKind, ModuleType};
use crate::error::{EvalError, EvalResult};
use crate::path;
use crate::tree::KnownPaths;

/// Full path to the full paths it reads.
pub type DependencyMap = BTreeMap<String, Vec<String>>;

/// Computes the dependencies of an entity's paths.
pub trait DependencyExtractor: fmt::Debug + Send + Sync {
    /// Returns what the single path `full_path` of `entity` reads.
    ///
    /// Paths outside the entity, and paths with nothing to read, yield an
    /// empty list.
    fn extract_for_path(
        &self,
        entity: &Entity,
        config: &EntityConfig,
        full_path: &str,
        known: &KnownPaths,
    ) -> Vec<String>;

    /// Returns the dependency map of the whole entity.
    ///
    /// Only paths with at least one dependency appear as keys. The default
    /// implementation visits every declared and dynamic property.
    fn extract(&self, entity: &Entity, config: &EntityConfig, known: &KnownPaths) -> DependencyMap {
        let mut map = DependencyMap::new();
        let candidates = config
            .dependency_map
            .keys()
            .chain(&config.dynamic_binding_path_list)
            .chain(&config.binding_paths);
        for property in candidates {
            let full = path::join(&config.name, property);
            if map.contains_key(&full) {
                continue;
            }
            let deps = self.extract_for_path(entity, config, &full, known);
            if !deps.is_empty() {
                map.insert(full, deps);
            }
        }
        map
    }
}

/// Reads dependencies from binding expressions only.
///
/// Used for widgets, script collections and module inputs. A property that
/// is not flagged as dynamic has no dependencies, even if its text happens to
/// look like a binding.
#[derive(Copy, Clone, Debug, Default)]
pub struct BindingExtractor;

impl DependencyExtractor for BindingExtractor {
    fn extract_for_path(
        &self,
        entity: &Entity,
        config: &EntityConfig,
        full_path: &str,
        known: &KnownPaths,
    ) -> Vec<String> {
        let mut deps = Vec::new();
        if let Some(property) = owned_property(config, full_path, known) {
            binding_dependencies(entity, config, property, known, &mut deps);
        }
        deps
    }
}

/// Reads the entity's declared wiring, then its binding expressions.
///
/// Used for queries and other entities whose own modeling knows part of
/// their dependencies. Declared targets are resolved relative to the entity
/// first (`config` inside `Query1` means `Query1.config`), then as full
/// paths. Unknown targets are dropped.
#[derive(Copy, Clone, Debug, Default)]
pub struct DeclaredExtractor;

impl DependencyExtractor for DeclaredExtractor {
    fn extract_for_path(
        &self,
        entity: &Entity,
        config: &EntityConfig,
        full_path: &str,
        known: &KnownPaths,
    ) -> Vec<String> {
        let mut deps = Vec::new();
        let Some(property) = owned_property(config, full_path, known) else {
            return deps;
        };
        if let Some(targets) = config.dependency_map.get(property) {
            for target in targets {
                if let Some(resolved) = resolve_declared(&config.name, target, known) {
                    push_unique(&mut deps, &resolved);
                }
            }
        }
        binding_dependencies(entity, config, property, known, &mut deps);
        deps
    }
}

/// Extractor for module instances.
///
/// Instances of query modules behave like [`DeclaredExtractor`]. Instances
/// of other module types expose no dependencies of their own.
#[derive(Copy, Clone, Debug, Default)]
pub struct ModuleInstanceExtractor;

impl DependencyExtractor for ModuleInstanceExtractor {
    fn extract_for_path(
        &self,
        entity: &Entity,
        config: &EntityConfig,
        full_path: &str,
        known: &KnownPaths,
    ) -> Vec<String> {
        match config.module_type {
            Some(ModuleType::Query) => {
                DeclaredExtractor.extract_for_path(entity, config, full_path, known)
            }
            _ => Vec::new(),
        }
    }
}

/// Returns the property part of `full_path` if it is an existing path of the
/// entity described by `config`.
fn owned_property<'a>(
    config: &EntityConfig,
    full_path: &'a str,
    known: &KnownPaths,
) -> Option<&'a str> {
    path::property_of(full_path, &config.name)
        .filter(|p| !p.is_empty() && known.contains(full_path))
}

fn binding_dependencies(
    entity: &Entity,
    config: &EntityConfig,
    property: &str,
    known: &KnownPaths,
    out: &mut Vec<String>,
) {
    if !config.is_dynamic_path(property) {
        return;
    }
    if let Some(value) = entity.property(property) {
        binding::collect_references(value, config.binding_syntax, known, out);
    }
}

fn resolve_declared(entity: &str, target: &str, known: &KnownPaths) -> Option<String> {
    let relative = path::join(entity, target);
    if known.contains(&relative) {
        return Some(relative);
    }
    known.contains(target).then(|| target.to_owned())
}

/// Extractors keyed by entity kind.
#[derive(Debug)]
pub struct ExtractorRegistry {
    by_kind: HashMap<EntityKind, Box<dyn DependencyExtractor>>,
    fallback: Box<dyn DependencyExtractor>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ExtractorRegistry {
    /// Creates a registry where every kind uses [`BindingExtractor`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_kind: HashMap::new(),
            fallback: Box::new(BindingExtractor),
        }
    }

    /// Creates a registry with the bundled extractors for the built-in kinds.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EntityKind::WIDGET, BindingExtractor);
        registry.register(EntityKind::JS_ACTION, BindingExtractor);
        registry.register(EntityKind::MODULE_INPUT, BindingExtractor);
        registry.register(EntityKind::ACTION, DeclaredExtractor);
        registry.register(EntityKind::MODULE_INSTANCE, ModuleInstanceExtractor);
        registry
    }

    /// Sets the extractor for `kind`, returning the one it replaces.
    pub fn register(
        &mut self,
        kind: EntityKind,
        extractor: impl DependencyExtractor + 'static,
    ) -> Option<Box<dyn DependencyExtractor>> {
        self.by_kind.insert(kind, Box::new(extractor))
    }

    /// Returns the extractor for `kind`.
    #[must_use]
    pub fn get(&self, kind: &EntityKind) -> &dyn DependencyExtractor {
        self.by_kind.get(kind).unwrap_or(&self.fallback).as_ref()
    }
}

/// Checks that every key of `map` is a path of the entity named `entity`.
///
/// On a violation, [`IntegrityHandling`] decides: `Fatal` returns the error,
/// `Degrade` logs and replaces the map with an empty one, and `DebugAssert`
/// panics in debug builds and degrades otherwise.
pub fn validate_integrity(
    entity: &str,
    map: &mut DependencyMap,
    known: &KnownPaths,
    handling: IntegrityHandling,
) -> EvalResult<()> {
    let Some(bad) = map
        .keys()
        .find(|key| path::property_of(key, entity).is_none() || !known.contains(key))
        .cloned()
    else {
        return Ok(());
    };
    match handling {
        IntegrityHandling::Fatal => {
            return Err(EvalError::Integrity {
                entity: entity.to_owned(),
                path: bad,
            });
        }
        IntegrityHandling::DebugAssert => {
            debug_assert!(false, "malformed dependency map for {entity}: {bad}");
        }
        IntegrityHandling::Degrade => {}
    }
    tracing::warn!(entity, path = %bad, "malformed dependency map; dropping the entity's dependencies");
    map.clear();
    Ok(())
}
