//! Key to set-of-values map used as the axis reverse index.

use std::collections::HashMap;
use std::hash::Hash;

/// Map from a key to a duplicate-free list of values.
///
/// Buckets keep insertion order and are pruned once empty, so
/// [`MultiMap::has_key`] is true exactly while a key has bindings.
#[derive(Debug, Clone)]
pub struct MultiMap<K, V> {
    map: HashMap<K, Vec<V>>,
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
        }
    }
}

impl<K, V> MultiMap<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `key`; false if the binding already existed.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let bucket = self.map.entry(key).or_default();
        if bucket.contains(&value) {
            return false;
        }
        bucket.push(value);
        true
    }

    /// Unbind `value` from `key`; false if there was no such binding.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let Some(bucket) = self.map.get_mut(key) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|v| v == value) else {
            return false;
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            self.map.remove(key);
        }
        true
    }

    /// Insert every pair, returning those actually added.
    pub fn insert_all(&mut self, items: impl IntoIterator<Item = (K, V)>) -> Vec<(K, V)> {
        items
            .into_iter()
            .filter(|(k, v)| self.insert(k.clone(), v.clone()))
            .collect()
    }

    /// Remove every pair, returning those actually removed.
    pub fn remove_all(&mut self, items: impl IntoIterator<Item = (K, V)>) -> Vec<(K, V)> {
        items
            .into_iter()
            .filter(|(k, v)| self.remove(k, v))
            .collect()
    }

    pub fn has_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &K) -> &[V] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All `(key, value)` bindings of `key`.
    pub fn get_items_by_key(&self, key: &K) -> Vec<(K, V)> {
        self.get(key)
            .iter()
            .map(|v| (key.clone(), v.clone()))
            .collect()
    }

    pub fn get_items_by_keys<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Vec<(K, V)>
    where
        K: 'a,
    {
        keys.into_iter()
            .flat_map(|k| self.get_items_by_key(k))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    /// Number of keys with at least one binding.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
