use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// A collection whose elements can be reached by key.
///
/// Used by [`Reducer::for_each`](super::Reducer::for_each) to route a keyed
/// action to one element.
pub trait Elements<K, V> {
    /// Mutably borrow the element stored under `key`.
    fn element_mut(&mut self, key: &K) -> Option<&mut V>;
}

impl<V> Elements<usize, V> for Vec<V> {
    fn element_mut(&mut self, key: &usize) -> Option<&mut V> {
        self.get_mut(*key)
    }
}

impl<K, V, S> Elements<K, V> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn element_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }
}

impl<K: Ord, V> Elements<K, V> for BTreeMap<K, V> {
    fn element_mut(&mut self, key: &K) -> Option<&mut V> {
        self.get_mut(key)
    }
}
