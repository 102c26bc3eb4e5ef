//! Append-only result cache.
//!
//! `ResultCache` maps a workflow-instance key (e.g. an inference id) to a
//! previously computed result. Entries are never evicted for the lifetime of
//! the process; cloning shares the same underlying map, so a cache handed to
//! successive controller mounts survives remounts. Values are cloned on read
//! so no `DashMap` guard is held by callers.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

#[derive(Debug)]
pub struct ResultCache<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<DashMap<K, V>>,
}

impl<K: Eq + Hash, V> Clone for ResultCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Cloned copy of the cached value, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// Store a result. Rewriting a key with the same value is harmless.
    pub fn set(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K, V> Default for ResultCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
