// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path addressing: `entityName.prop.subprop`.
//!
//! A full path names one property of one entity. The entity name alone is a
//! path too: it addresses the whole entity record.

use core::fmt;

use crate::error::{EvalError, EvalResult};

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// A full path split into its entity name and property path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyPath<'a> {
    /// The owning entity.
    pub entity: &'a str,
    /// The path inside the entity; empty for the entity itself.
    pub property: &'a str,
}

impl<'a> PropertyPath<'a> {
    /// Parses a full path, rejecting empty segments.
    ///
    /// ```
    /// use evaltree::path::PropertyPath;
    ///
    /// let p = PropertyPath::parse("Query1.run.config").unwrap();
    /// assert_eq!(p.entity, "Query1");
    /// assert_eq!(p.property, "run.config");
    /// assert!(PropertyPath::parse("Query1..config").is_err());
    /// ```
    pub fn parse(full: &'a str) -> EvalResult<Self> {
        if full.is_empty() || full.split(SEPARATOR).any(str::is_empty) {
            return Err(EvalError::InvalidPath(full.to_owned()));
        }
        let (entity, property) = split(full);
        Ok(Self { entity, property })
    }

    /// Returns `true` if this addresses the whole entity.
    #[must_use]
    pub fn is_entity(&self) -> bool {
        self.property.is_empty()
    }
}

impl fmt::Display for PropertyPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.property.is_empty() {
            f.write_str(self.entity)
        } else {
            write!(f, "{}{SEPARATOR}{}", self.entity, self.property)
        }
    }
}

/// Joins an entity name and a property path.
#[must_use]
pub fn join(entity: &str, property: &str) -> String {
    if property.is_empty() {
        return entity.to_owned();
    }
    let mut out = String::with_capacity(entity.len() + 1 + property.len());
    out.push_str(entity);
    out.push(SEPARATOR);
    out.push_str(property);
    out
}

/// Splits a full path into entity name and property path, without validation.
#[must_use]
pub fn split(full: &str) -> (&str, &str) {
    full.split_once(SEPARATOR).unwrap_or((full, ""))
}

/// Returns the entity name of a full path.
#[must_use]
pub fn entity_of(full: &str) -> &str {
    split(full).0
}

/// Returns the property part of `full` if it belongs to `entity`.
///
/// The entity path itself yields `Some("")`.
#[must_use]
pub fn property_of<'a>(full: &'a str, entity: &str) -> Option<&'a str> {
    let rest = full.strip_prefix(entity)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix(SEPARATOR)
}

/// Returns the parent path, or `None` for an entity path.
#[must_use]
pub fn parent(full: &str) -> Option<&str> {
    full.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Returns `true` if `path` lies strictly below `ancestor`.
#[must_use]
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

/// Iterates over the segments of a path.
pub fn segments(full: &str) -> impl Iterator<Item = &str> + '_ {
    full.split(SEPARATOR)
}

/// Iterates over the prefixes of a path from longest to shortest.
///
/// `"a.b.c"` yields `"a.b.c"`, `"a.b"`, `"a"`.
pub fn prefixes(full: &str) -> impl Iterator<Item = &str> + '_ {
    core::iter::successors(Some(full), |p| parent(p))
}

/// Returns `true` if `name` is usable as an entity name.
#[must_use]
pub fn is_valid_entity_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_split_round_trip() {
        let full = join("Input1", "value");
        assert_eq!(full, "Input1.value");
        assert_eq!(split(&full), ("Input1", "value"));
        assert_eq!(split("Input1"), ("Input1", ""));
        assert_eq!(join("Input1", ""), "Input1");
    }

    #[test]
    fn property_of_requires_a_segment_boundary() {
        assert_eq!(property_of("Input1.value", "Input1"), Some("value"));
        assert_eq!(property_of("Input1", "Input1"), Some(""));
        assert_eq!(property_of("Input10.value", "Input1"), None);
    }

    #[test]
    fn parents_and_prefixes() {
        assert_eq!(parent("a.b.c"), Some("a.b"));
        assert_eq!(parent("a"), None);
        assert_eq!(prefixes("a.b.c").collect::<Vec<_>>(), vec!["a.b.c", "a.b", "a"]);
        assert!(is_descendant("a.b.c", "a.b"));
        assert!(!is_descendant("a.bc", "a.b"));
        assert!(!is_descendant("a.b", "a.b"));
    }

    #[test]
    fn display_matches_join() {
        let p = PropertyPath::parse("Table1.data").unwrap();
        assert_eq!(p.to_string(), "Table1.data");
        assert!(PropertyPath::parse("Table1").unwrap().is_entity());
        assert!(PropertyPath::parse("").is_err());
    }

    #[test]
    fn entity_names() {
        assert!(is_valid_entity_name("Input1"));
        assert!(is_valid_entity_name("_tmp"));
        assert!(!is_valid_entity_name("1Input"));
        assert!(!is_valid_entity_name("Input.1"));
        assert!(!is_valid_entity_name(""));
    }
}
