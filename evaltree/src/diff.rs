// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Snapshot diffing.

use hashbrown::HashSet;
use serde::Serialize;

use crate::snapshot::Snapshot;
use crate::value::Value;

/// What a patch does to its path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOp {
    /// The path has a new value.
    Set,
    /// The path no longer has a value.
    Delete,
}

/// One change between two snapshots.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Patch {
    /// The leaf path that changed.
    pub path: String,
    /// What happened to it.
    pub op: PatchOp,
    /// The new value, for [`PatchOp::Set`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Patch {
    /// Creates a `Set` patch.
    #[must_use]
    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            op: PatchOp::Set,
            value: Some(value),
        }
    }

    /// Creates a `Delete` patch.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            op: PatchOp::Delete,
            value: None,
        }
    }
}

/// Lists the changes between `previous` and `current`, looking only at
/// `paths`.
///
/// A path present in `current` whose value differs from `previous` (or that
/// `previous` lacks) yields `Set`; a path `previous` has and `current` lacks
/// yields `Delete`. Patches follow the order of `paths`, and each path is
/// considered once. Paths outside `paths` are never inspected, so
/// `previous` only needs to hold the values of those paths.
///
/// ```
/// use evaltree::{diff, Patch, Snapshot, Value};
/// use serde_json::json;
///
/// let mut before = Snapshot::new();
/// before.insert("A.x", Value::from(json!(1)));
/// before.insert("A.y", Value::from(json!(2)));
/// let mut after = Snapshot::new();
/// after.insert("A.x", Value::from(json!(1)));
/// after.insert("A.y", Value::from(json!(3)));
///
/// let patches = diff(&before, &after, ["A.x", "A.y"]);
/// assert_eq!(patches, vec![Patch::set("A.y", Value::from(json!(3)))]);
/// ```
#[must_use]
pub fn diff<'a>(
    previous: &Snapshot,
    current: &Snapshot,
    paths: impl IntoIterator<Item = &'a str>,
) -> Vec<Patch> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut patches = Vec::new();
    for path in paths {
        if !seen.insert(path) {
            continue;
        }
        match (previous.get(path), current.get(path)) {
            (before, Some(now)) if before != Some(now) => {
                patches.push(Patch::set(path, now.clone()));
            }
            (Some(_), None) => patches.push(Patch::delete(path)),
            _ => {}
        }
    }
    patches
}
