//! An insertion-ordered set. Link order matters for symbol resolution and declared input order
//! matters for build reproducibility, so every collection of artifacts or inputs that ends up in a
//! plan goes through this type rather than a hash set.
//!
//! Iteration order is the order in which values were first inserted. Inserting a value that
//! compares equal to one already present is a no-op, the earlier position wins. Hashing uses a
//! fixed seed, so nothing about the set depends on per-process randomness.

use foldhash::fast::FixedState;
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

pub type FixedIndexMap<K, V> = indexmap::IndexMap<K, V, FixedState>;

#[derive(Clone)]
pub struct OrderedSet<T: Hash + Eq>(IndexSet<T, FixedState>);

/// Two sets are only equal if they contain the same values in the same order.
impl<T: Hash + Eq> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().eq(other.0.iter())
    }
}

impl<T: Hash + Eq> Eq for OrderedSet<T> {}

impl<T: Hash + Eq> OrderedSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(IndexSet::with_hasher(FixedState::default()))
    }

    /// Adds `value` unless an equal value is already present. Returns whether it was added.
    pub fn insert(&mut self, value: T) -> bool {
        self.0.insert(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.0.contains(value)
    }

    pub fn iter(&self) -> indexmap::set::Iter<'_, T> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.0.first()
    }
}

pub fn new_map<K: Hash + Eq, V>() -> FixedIndexMap<K, V> {
    indexmap::IndexMap::with_hasher(FixedState::default())
}

impl<T: Hash + Eq> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<T: Hash + Eq> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Hash + Eq> IntoIterator for OrderedSet<T> {
    type Item = T;
    type IntoIter = indexmap::set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T: Hash + Eq> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = indexmap::set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: Hash + Eq + Debug> Debug for OrderedSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

impl<T: Hash + Eq + Serialize> Serialize for OrderedSet<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::OrderedSet;
    use itertools::Itertools;

    #[test]
    fn keeps_first_insertion_position() {
        let mut set = OrderedSet::new();
        assert!(set.insert("b"));
        assert!(set.insert("a"));
        assert!(!set.insert("b"));
        set.extend(["c", "a"]);
        assert_eq!(set.iter().copied().collect_vec(), ["b", "a", "c"]);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a: OrderedSet<u32> = [1, 2].into_iter().collect();
        let b: OrderedSet<u32> = [2, 1].into_iter().collect();
        assert_ne!(a, b);
    }

    #[test]
    fn equal_regardless_of_how_built() {
        let a: OrderedSet<u32> = [3, 1, 3, 2].into_iter().collect();
        let mut b = OrderedSet::new();
        b.extend([3, 1, 2, 1]);
        assert_eq!(a, b);
    }
}
