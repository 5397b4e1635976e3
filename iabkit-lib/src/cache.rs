//! Local ownership cache.
//!
//! One [`OwnershipCache`] exists per [`Category`](crate::Category). A product is
//! present iff the client currently believes the user owns it. Entries keep
//! insertion order and are persisted on every mutation, so the in-memory view
//! never runs ahead of the store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, KeyValueStoreExt, StorageResult};

/// A single owned product and the token needed to consume it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPurchase {
    pub product_id: String,
    pub purchase_token: String,
}

/// Durable map from product id to purchase token for one category.
pub struct OwnershipCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    entries: Vec<CachedPurchase>,
}

impl OwnershipCache {
    /// Load the cache stored under `key`; a missing key yields an empty cache.
    pub fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> StorageResult<Self> {
        let key = key.into();
        let entries = store
            .get_json::<Vec<CachedPurchase>>(&key)?
            .unwrap_or_default();
        Ok(Self {
            store,
            key,
            entries,
        })
    }

    /// Storage key this cache persists under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.entries.iter().any(|e| e.product_id == product_id)
    }

    /// Owned product ids in insertion order.
    pub fn list(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.product_id.clone()).collect()
    }

    pub fn entries(&self) -> &[CachedPurchase] {
        &self.entries
    }

    pub fn token_for(&self, product_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.product_id == product_id)
            .map(|e| e.purchase_token.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record ownership of `product_id`. Overwriting keeps the original position.
    pub fn put(
        &mut self,
        product_id: impl Into<String>,
        purchase_token: impl Into<String>,
    ) -> StorageResult<()> {
        let entry = CachedPurchase {
            product_id: product_id.into(),
            purchase_token: purchase_token.into(),
        };
        let mut next = self.entries.clone();
        match next.iter_mut().find(|e| e.product_id == entry.product_id) {
            Some(existing) => *existing = entry,
            None => next.push(entry),
        }
        self.commit(next)
    }

    /// Drop `product_id`. Returns whether it was present.
    pub fn remove(&mut self, product_id: &str) -> StorageResult<bool> {
        if !self.contains(product_id) {
            return Ok(false);
        }
        let next = self
            .entries
            .iter()
            .filter(|e| e.product_id != product_id)
            .cloned()
            .collect();
        self.commit(next)?;
        Ok(true)
    }

    pub fn clear(&mut self) -> StorageResult<()> {
        self.store.remove(&self.key)?;
        self.entries.clear();
        Ok(())
    }

    /// Replace the whole cache with `entries` in a single write.
    ///
    /// Later duplicates of a product id overwrite earlier ones in place.
    pub fn replace_all<I, P, T>(&mut self, entries: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        let mut next: Vec<CachedPurchase> = Vec::new();
        for (product_id, purchase_token) in entries {
            let entry = CachedPurchase {
                product_id: product_id.into(),
                purchase_token: purchase_token.into(),
            };
            match next.iter_mut().find(|e| e.product_id == entry.product_id) {
                Some(existing) => *existing = entry,
                None => next.push(entry),
            }
        }
        self.commit(next)
    }

    fn commit(&mut self, next: Vec<CachedPurchase>) -> StorageResult<()> {
        self.store.put_json(&self.key, &next)?;
        self.entries = next;
        Ok(())
    }
}

/// Persistent "purchase history restored" flag.
///
/// Only ever moves from false to true through this type.
pub struct HistoryFlag {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl HistoryFlag {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn is_set(&self) -> StorageResult<bool> {
        self.store.get_bool(&self.key, false)
    }

    pub fn set(&self) -> StorageResult<()> {
        self.store.put_bool(&self.key, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn cache_with_store() -> (OwnershipCache, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let cache = OwnershipCache::load(store.clone(), "products").unwrap();
        (cache, store)
    }

    #[test]
    fn test_empty_by_default() {
        let (cache, _) = cache_with_store();
        assert!(cache.is_empty());
        assert!(!cache.contains("coins100"));
        assert!(cache.token_for("coins100").is_none());
    }

    #[test]
    fn test_put_is_idempotent_overwrite() {
        let (mut cache, _) = cache_with_store();

        cache.put("a", "t1").unwrap();
        cache.put("b", "t2").unwrap();
        cache.put("a", "t3").unwrap();

        assert_eq!(cache.list(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.token_for("a"), Some("t3"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let (mut cache, store) = cache_with_store();

        cache.put("a", "t1").unwrap();
        let reloaded = OwnershipCache::load(store.clone(), "products").unwrap();
        assert_eq!(reloaded.token_for("a"), Some("t1"));

        assert!(cache.remove("a").unwrap());
        let reloaded = OwnershipCache::load(store.clone(), "products").unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let (mut cache, _) = cache_with_store();
        cache.put("a", "t1").unwrap();

        assert!(!cache.remove("zzz").unwrap());
        assert_eq!(cache.list(), vec!["a".to_string()]);
    }

    #[test]
    fn test_replace_all_drops_stale_entries() {
        let (mut cache, store) = cache_with_store();
        cache.put("stale", "old").unwrap();

        cache
            .replace_all(vec![("x", "1"), ("y", "2"), ("x", "3")])
            .unwrap();

        assert_eq!(cache.list(), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(cache.token_for("x"), Some("3"));
        assert!(!cache.contains("stale"));

        let reloaded = OwnershipCache::load(store, "products").unwrap();
        assert_eq!(reloaded.entries(), cache.entries());
    }

    #[test]
    fn test_clear() {
        let (mut cache, store) = cache_with_store();
        cache.put("a", "t1").unwrap();

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(store.get("products").unwrap().is_none());
    }

    #[test]
    fn test_caches_are_independent() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let mut products = OwnershipCache::load(store.clone(), "products").unwrap();
        let subscriptions = OwnershipCache::load(store.clone(), "subscriptions").unwrap();

        products.put("same-id", "tok").unwrap();
        assert!(products.contains("same-id"));
        assert!(!subscriptions.contains("same-id"));
    }

    #[test]
    fn test_history_flag() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let flag = HistoryFlag::new(store.clone(), "restored");

        assert!(!flag.is_set().unwrap());
        flag.set().unwrap();
        assert!(flag.is_set().unwrap());
        assert!(HistoryFlag::new(store, "restored").is_set().unwrap());
    }
}
