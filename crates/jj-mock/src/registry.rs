//! Ordered key-value store keyed by `(owner, namespace, key)`.
//!
//! Each `(owner, namespace)` pair owns an insertion-ordered map. Order is
//! significant: the resolver relies on it for registration priority. The
//! registry performs no validation and no locking of its own; callers guard
//! it (see `Resolver`).

use std::collections::HashMap;
use std::hash::Hash;

/// Generic ordered registry.
#[derive(Debug, Clone)]
pub struct Registry<O, K, V> {
    entries: HashMap<(O, &'static str), Vec<(K, V)>>,
}

impl<O, K, V> Default for Registry<O, K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<O, K, V> Registry<O, K, V>
where
    O: Eq + Hash + Clone,
    K: PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update `key` under `(owner, namespace)`.
    ///
    /// Updating an existing key keeps its original position.
    pub fn add(&mut self, owner: O, namespace: &'static str, key: K, value: V) {
        let map = self.entries.entry((owner, namespace)).or_default();
        match map.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => map.push((key, value)),
        }
    }

    /// Insert `key` with a default value, leaving an existing entry untouched.
    pub fn add_key(&mut self, owner: O, namespace: &'static str, key: K)
    where
        V: Default,
    {
        let map = self.entries.entry((owner, namespace)).or_default();
        if !map.iter().any(|(k, _)| *k == key) {
            map.push((key, V::default()));
        }
    }

    /// Ordered entries for `(owner, namespace)`; empty if nothing was added.
    pub fn get(&self, owner: &O, namespace: &'static str) -> &[(K, V)] {
        self.entries
            .get(&(owner.clone(), namespace))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Value for a single key, if present.
    pub fn get_value(&self, owner: &O, namespace: &'static str, key: &K) -> Option<&V> {
        self.get(owner, namespace)
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, owner: &O, namespace: &'static str, key: &K) -> bool {
        self.get_value(owner, namespace, key).is_some()
    }

    /// Ordered keys for `(owner, namespace)`.
    pub fn keys<'a>(&'a self, owner: &O, namespace: &'static str) -> impl Iterator<Item = &'a K> {
        self.get(owner, namespace).iter().map(|(k, _)| k)
    }

    /// Remove `key`; a missing key is a no-op.
    pub fn remove(&mut self, owner: &O, namespace: &'static str, key: &K) -> Option<V> {
        let map = self.entries.get_mut(&(owner.clone(), namespace))?;
        let index = map.iter().position(|(k, _)| k == key)?;
        let (_, value) = map.remove(index);
        if map.is_empty() {
            self.entries.remove(&(owner.clone(), namespace));
        }
        Some(value)
    }

    /// Drop every namespace belonging to `owner`.
    pub fn remove_owner(&mut self, owner: &O) {
        self.entries.retain(|(o, _), _| o != owner);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_is_empty() {
        let registry: Registry<&str, &str, u32> = Registry::new();
        assert!(registry.get(&"owner", "ns").is_empty());
        assert!(registry.get_value(&"owner", "ns", &"key").is_none());
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut registry = Registry::new();
        registry.add("owner", "ns", "b", 2);
        registry.add("owner", "ns", "a", 1);
        registry.add("owner", "ns", "c", 3);

        let keys: Vec<_> = registry.keys(&"owner", "ns").copied().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_add_existing_key_keeps_position() {
        let mut registry = Registry::new();
        registry.add("owner", "ns", "a", 1);
        registry.add("owner", "ns", "b", 2);
        registry.add("owner", "ns", "a", 10);

        assert_eq!(registry.get(&"owner", "ns"), &[("a", 10), ("b", 2)]);
    }

    #[test]
    fn test_add_key_does_not_overwrite() {
        let mut registry: Registry<&str, &str, u32> = Registry::new();
        registry.add("owner", "ns", "a", 7);
        registry.add_key("owner", "ns", "a");
        registry.add_key("owner", "ns", "b");

        assert_eq!(registry.get(&"owner", "ns"), &[("a", 7), ("b", 0)]);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let mut registry = Registry::new();
        registry.add("owner", "one", "k", 1);
        registry.add("owner", "two", "k", 2);
        registry.add("other", "one", "k", 3);

        assert_eq!(registry.get_value(&"owner", "one", &"k"), Some(&1));
        assert_eq!(registry.get_value(&"owner", "two", &"k"), Some(&2));
        assert_eq!(registry.get_value(&"other", "one", &"k"), Some(&3));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut registry: Registry<&str, &str, u32> = Registry::new();
        assert!(registry.remove(&"owner", "ns", &"key").is_none());

        registry.add("owner", "ns", "key", 1);
        assert_eq!(registry.remove(&"owner", "ns", &"key"), Some(1));
        assert!(registry.get(&"owner", "ns").is_empty());
    }

    #[test]
    fn test_remove_owner() {
        let mut registry = Registry::new();
        registry.add("owner", "one", "k", 1);
        registry.add("owner", "two", "k", 2);
        registry.add("other", "one", "k", 3);

        registry.remove_owner(&"owner");

        assert!(registry.get(&"owner", "one").is_empty());
        assert!(registry.get(&"owner", "two").is_empty());
        assert_eq!(registry.get(&"other", "one"), &[("k", 3)]);
    }
}
