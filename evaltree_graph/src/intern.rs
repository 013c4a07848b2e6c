// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interning for owned keys.
//!
//! The graph and ordering types are keyed by `K: Copy` so hot loops never
//! clone strings. Property paths are owned strings, so embedders intern them
//! into an [`InternId`] first.
//!
//! Ids are handed out densely in first-seen order and are never reused, so
//! comparing two ids compares their registration order. The evaluation order
//! relies on this to place cyclic keys deterministically.
//!
//! ## Example
//!
//! ```rust
//! use evaltree_graph::{DependencyGraph, EvaluationOrder, Interner};
//!
//! let mut ids = Interner::<String>::new();
//! let input = ids.intern("Input1.value".to_owned());
//! let text = ids.intern("Text1.text".to_owned());
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_dependency(text, input);
//!
//! let order = EvaluationOrder::compute(&graph);
//! assert_eq!(order.as_slice(), &[input, text]);
//! assert_eq!(ids.lookup("Text1.text"), Some(text));
//! assert_eq!(ids.get(input).map(String::as_str), Some("Input1.value"));
//! ```

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

use hashbrown::DefaultHashBuilder;
use hashbrown::HashMap;

/// A compact, interned identifier.
///
/// Ordering follows registration order: an id interned earlier compares less
/// than one interned later.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct InternId(u32);

impl InternId {
    /// Returns this id as a `usize` index (for tables keyed by intern ids).
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw numeric id.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Interns owned keys into compact [`InternId`] handles.
///
/// Keys are stored once in an internal table. Lookups use a hash-bucket index
/// (hash -> small list of candidate ids) to avoid storing duplicate key copies.
#[derive(Debug, Clone)]
pub struct Interner<K> {
    keys: Vec<K>,
    buckets: HashMap<u64, Vec<InternId>>,
    build_hasher: DefaultHashBuilder,
}

impl<K> Default for Interner<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Interner<K>
where
    K: Eq + Hash,
{
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            buckets: HashMap::new(),
            build_hasher: DefaultHashBuilder::default(),
        }
    }

    /// Returns the number of interned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the interner contains no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the key for an interned id, if the id is in-range.
    #[must_use]
    pub fn get(&self, id: InternId) -> Option<&K> {
        self.keys.get(id.as_usize())
    }

    /// Returns the id of an already-interned key without interning it.
    #[must_use]
    pub fn lookup<Q>(&self, key: &Q) -> Option<InternId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash(key);
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|id| self.keys[id.as_usize()].borrow() == key)
    }

    /// Interns `key` and returns its [`InternId`].
    ///
    /// If an equal key was already interned, this returns the existing id and
    /// drops `key`.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` distinct keys are interned.
    pub fn intern(&mut self, key: K) -> InternId {
        let hash = self.hash(&key);
        if let Some(ids) = self.buckets.get(&hash) {
            for &id in ids {
                if self.keys[id.as_usize()] == key {
                    return id;
                }
            }
        }

        let id = InternId(
            u32::try_from(self.keys.len()).expect("too many interned keys for InternId (u32)"),
        );
        self.keys.push(key);
        self.buckets.entry(hash).or_default().push(id);
        id
    }

    /// Iterates over all interned ids and their keys, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (InternId, &K)> + '_ {
        self.keys.iter().zip(0_u32..).map(|(k, i)| (InternId(i), k))
    }

    /// Clears all interned keys.
    ///
    /// This drops all stored keys and invalidates any previously returned ids.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.buckets.clear();
    }

    fn hash<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        self.build_hasher.hash_one(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_duplicates_to_same_id() {
        let mut i = Interner::<String>::new();
        let a0 = i.intern("a".to_owned());
        let a1 = i.intern("a".to_owned());
        let b = i.intern("b".to_owned());

        assert_eq!(a0, a1);
        assert_ne!(a0, b);
        assert_eq!(i.get(a0).unwrap(), "a");
        assert_eq!(i.get(b).unwrap(), "b");
        assert_eq!(i.len(), 2);
    }

    #[test]
    fn ids_follow_registration_order() {
        let mut i = Interner::<String>::new();
        let z = i.intern("z".to_owned());
        let a = i.intern("a".to_owned());
        assert!(z < a);
    }

    #[test]
    fn lookup_by_borrowed_key_does_not_intern() {
        let mut i = Interner::<String>::new();
        let a = i.intern("Input1.value".to_owned());

        assert_eq!(i.lookup("Input1.value"), Some(a));
        assert_eq!(i.lookup("Input1.text"), None);
        assert_eq!(i.len(), 1);
    }
}
