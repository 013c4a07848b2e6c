// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Evaluated values keyed by leaf path.

use core::ops::Bound;
use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

use crate::path::{self, SEPARATOR};
use crate::value::Value;

/// The evaluated values of every leaf path.
///
/// Composite paths hold no value of their own; reading one assembles an
/// object from the leaves below it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    values: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored leaf values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value stored at leaf `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    /// Returns `true` if leaf `path` has a value.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    /// Stores `value` at leaf `path`, returning the previous value.
    pub fn insert(&mut self, path: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(path.into(), value)
    }

    /// Removes the value at leaf `path`.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        self.values.remove(path)
    }

    /// Iterates over `(path, value)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over the leaves strictly below `prefix`.
    pub fn below<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        let start = format!("{prefix}{SEPARATOR}");
        self.values
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded))
            .take_while(move |(k, _)| path::is_descendant(k, prefix))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Assembles the value of `path`: the stored leaf, or an object built
    /// from the leaves below it. `undefined` leaves are left out of objects.
    #[must_use]
    pub fn assemble(&self, path: &str) -> Option<Value> {
        if let Some(v) = self.values.get(path) {
            return Some(v.clone());
        }
        let mut root = Map::new();
        let mut any = false;
        for (leaf, value) in self.below(path) {
            any = true;
            let Some(json) = value.as_json() else {
                continue;
            };
            let relative = &leaf[path.len() + 1..];
            insert_nested(&mut root, relative, json.clone());
        }
        any.then(|| Value::Data(JsonValue::Object(root)))
    }

    /// Reads the value at `segments` the way an expression sees it.
    ///
    /// Tries the full path first (leaf or composite), then walks into the
    /// nearest leaf above it that holds structured data.
    #[must_use]
    pub fn lookup(&self, segments: &[&str]) -> Option<Value> {
        let full = segments.join(".");
        if let Some(v) = self.assemble(&full) {
            return Some(v);
        }
        for end in (1..segments.len()).rev() {
            if let Some(v) = self.values.get(&segments[..end].join(".")) {
                return Some(v.navigate(&segments[end..]));
            }
        }
        None
    }
}

fn insert_nested(root: &mut Map<String, JsonValue>, relative: &str, value: JsonValue) {
    let mut map = root;
    let mut segments = relative.split(SEPARATOR).peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            map.insert(segment.to_owned(), value);
            return;
        }
        let slot = map
            .entry(segment.to_owned())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !slot.is_object() {
            *slot = JsonValue::Object(Map::new());
        }
        let Some(next) = slot.as_object_mut() else {
            return;
        };
        map = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Snapshot {
        let mut s = Snapshot::new();
        s.insert("Table1.data", Value::from(json!([{"id": 1}])));
        s.insert("Table1.meta.page", Value::from(json!(2)));
        s.insert("Table1.meta.size", Value::Undefined);
        s.insert("Table10.data", Value::from(json!("other")));
        s
    }

    #[test]
    fn composites_assemble_from_leaves() {
        let s = sample();
        assert_eq!(
            s.assemble("Table1"),
            Some(Value::from(json!({"data": [{"id": 1}], "meta": {"page": 2}})))
        );
        assert_eq!(s.assemble("Table1.meta"), Some(Value::from(json!({"page": 2}))));
        assert_eq!(s.assemble("Table2"), None);
    }

    #[test]
    fn below_respects_segment_boundaries() {
        let s = sample();
        let paths: Vec<&str> = s.below("Table1").map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["Table1.data", "Table1.meta.page", "Table1.meta.size"]);
    }

    #[test]
    fn lookup_walks_into_leaves() {
        let s = sample();
        assert_eq!(s.lookup(&["Table1", "data", "0", "id"]), Some(Value::from(json!(1))));
        assert_eq!(s.lookup(&["Table1", "meta", "page"]), Some(Value::from(json!(2))));
        assert_eq!(s.lookup(&["Table1", "nothing"]), None);
        assert_eq!(s.lookup(&["Table1", "data", "9"]), Some(Value::Undefined));
    }
}
