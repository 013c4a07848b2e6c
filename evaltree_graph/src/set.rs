// Copyright 2025 the Evaltree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending set: de-duplicated, insertion-ordered change keys.

use core::hash::Hash;

use hashbrown::HashSet;

/// Accumulated pending keys.
///
/// `PendingSet` collects the keys reported as changed between two evaluation
/// passes. Re-marking a key is a no-op, and iteration yields keys in the order
/// they were first marked, so a drained batch is reproducible.
///
/// # Example
///
/// ```
/// use evaltree_graph::PendingSet;
///
/// let mut pending = PendingSet::<&str>::new();
/// pending.mark("Input1.text");
/// pending.mark("Table1.data");
/// pending.mark("Input1.text");
///
/// assert_eq!(pending.len(), 2);
/// let batch = pending.drain();
/// assert_eq!(batch, vec!["Input1.text", "Table1.data"]);
/// assert!(pending.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct PendingSet<K>
where
    K: Clone + Eq + Hash,
{
    keys: Vec<K>,
    index: HashSet<K>,
}

impl<K> Default for PendingSet<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> PendingSet<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates a new empty pending set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            index: HashSet::new(),
        }
    }

    /// Marks a key as pending.
    ///
    /// Returns `true` if the key was newly inserted.
    pub fn mark(&mut self, key: K) -> bool {
        if self.index.insert(key.clone()) {
            self.keys.push(key);
            true
        } else {
            false
        }
    }

    /// Marks every key in `keys` as pending.
    pub fn extend(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.mark(key);
        }
    }

    /// Returns `true` if the key is pending.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains(key)
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the number of pending keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns an iterator over the pending keys in first-marked order.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.keys.iter()
    }

    /// Takes all pending keys, in first-marked order, leaving the set empty.
    pub fn drain(&mut self) -> Vec<K> {
        self.index.clear();
        core::mem::take(&mut self.keys)
    }

    /// Clears all pending keys.
    pub fn clear(&mut self) {
        self.index.clear();
        self.keys.clear();
    }

    /// Removes a specific key.
    ///
    /// Returns `true` if the key was pending.
    pub fn remove_key(&mut self, key: &K) -> bool {
        if !self.index.remove(key) {
            return false;
        }
        self.keys.retain(|k| k != key);
        true
    }

    /// Keeps only the keys for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        let index = &mut self.index;
        self.keys.retain(|k| {
            let kept = keep(k);
            if !kept {
                index.remove(k);
            }
            kept
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_query() {
        let mut pending = PendingSet::<u32>::new();
        assert!(pending.mark(1));
        assert!(pending.mark(2));
        assert!(!pending.mark(1));

        assert!(pending.contains(&1));
        assert!(!pending.contains(&3));
        assert_eq!(pending.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn retain_forgets_dropped_keys() {
        let mut pending = PendingSet::<u32>::new();
        pending.extend([1, 2, 3, 4]);
        pending.retain(|k| k % 2 == 0);
        assert_eq!(pending.iter().copied().collect::<Vec<_>>(), vec![2, 4]);
        assert!(!pending.contains(&1));
        assert!(pending.mark(1));
    }

    #[test]
    fn remove_key_keeps_order_of_the_rest() {
        let mut pending = PendingSet::<u32>::new();
        pending.extend([3, 1, 2]);
        assert!(pending.remove_key(&1));
        assert!(!pending.remove_key(&1));
        assert_eq!(pending.drain(), vec![3, 2]);
    }

    #[test]
    fn clear_empties() {
        let mut pending = PendingSet::<u32>::new();
        pending.extend([1, 2]);
        pending.clear();
        assert!(pending.is_empty());
        assert_eq!(pending.len(), 0);
        assert!(pending.mark(1));
    }
}
