//! Process-local memory adapter backed by `cached::SizedCache`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cached::{Cached, SizedCache};

use crate::adapter::{AdapterState, CacheAdapter};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::key::{self, CacheKey, KeyNamespacer};
use crate::ttl::{Ttl, TtlPolicy};

struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

type Segment = Mutex<SizedCache<String, MemoryEntry>>;

/// Reads one entry, dropping it as a miss if its deadline passed.
fn lookup(store: &mut SizedCache<String, MemoryEntry>, nskey: &String) -> Option<Vec<u8>> {
    let hit = store
        .cache_get(nskey)
        .map(|entry| (entry.is_expired(), entry.value.clone()));
    match hit {
        Some((false, value)) => Some(value),
        Some((true, _)) => {
            store.cache_remove(nskey);
            None
        }
        None => None,
    }
}

/// In-process LRU cache with per-entry TTL layered over the sized store.
///
/// Construction with a zero-capacity segment leaves the adapter permanently
/// disabled; every operation then returns its degraded value. Safe for
/// concurrent use: the segment sits behind a mutex held only for the
/// duration of one operation.
pub struct MemoryAdapter {
    segment: Option<Segment>,
    ns: KeyNamespacer,
    ttl: TtlPolicy,
}

impl MemoryAdapter {
    pub fn new(config: &CacheConfig) -> Self {
        // SizedCache panics on zero capacity.
        let segment = (config.memory.max_entries > 0)
            .then(|| Mutex::new(SizedCache::with_size(config.memory.max_entries)));
        if segment.is_none() {
            tracing::warn!("memory cache has zero capacity, adapter disabled");
        }
        Self {
            segment,
            ns: KeyNamespacer::new(&config.ns),
            ttl: TtlPolicy::new(config.ttl),
        }
    }

    fn expires_at(&self, ttl: Ttl) -> Option<Instant> {
        let secs = self.ttl.resolve(ttl, None)?;
        // A deadline too far out to represent behaves as no expiration.
        Instant::now().checked_add(Duration::from_secs(secs))
    }
}

#[async_trait]
impl CacheAdapter for MemoryAdapter {
    fn state(&self) -> AdapterState {
        if self.segment.is_some() {
            AdapterState::Ready
        } else {
            AdapterState::Disabled
        }
    }

    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let segment = self.segment.as_ref()?;
        let Ok(mut store) = segment.lock() else {
            return None;
        };
        let nskey = self.ns.apply(key);
        lookup(&mut store, &nskey)
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Ttl) -> bool {
        let Some(segment) = &self.segment else {
            return false;
        };
        let Ok(mut store) = segment.lock() else {
            return false;
        };
        let entry = MemoryEntry {
            value,
            expires_at: self.expires_at(ttl),
        };
        store.cache_set(self.ns.apply(key), entry);
        true
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        let Some(segment) = &self.segment else {
            return false;
        };
        let Ok(mut store) = segment.lock() else {
            return false;
        };
        store.cache_remove(&self.ns.apply(key));
        true
    }

    async fn has(&self, key: &CacheKey) -> bool {
        let Some(segment) = &self.segment else {
            return false;
        };
        let Ok(mut store) = segment.lock() else {
            return false;
        };
        let nskey = self.ns.apply(key);
        lookup(&mut store, &nskey).is_some()
    }

    async fn get_multiple(
        &self,
        keys: Vec<CacheKey>,
    ) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError> {
        key::check_keys(&keys)?;
        let mut values = HashMap::with_capacity(keys.len());
        let store = self.segment.as_ref().and_then(|s| s.lock().ok());
        match store {
            Some(mut store) => {
                for key in keys {
                    let nskey = self.ns.apply(&key);
                    let hit = lookup(&mut store, &nskey);
                    values.insert(key, hit);
                }
            }
            None => {
                for key in keys {
                    values.insert(key, None);
                }
            }
        }
        Ok(values)
    }

    async fn set_multiple(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        ttl: Ttl,
    ) -> Result<bool, CacheError> {
        key::check_entries(&entries)?;
        // An empty batch touches no backend, so it succeeds even disabled.
        if entries.is_empty() {
            return Ok(true);
        }
        let Some(segment) = &self.segment else {
            return Ok(false);
        };
        let Ok(mut store) = segment.lock() else {
            return Ok(false);
        };
        for (key, value) in entries {
            let entry = MemoryEntry {
                value,
                expires_at: self.expires_at(ttl),
            };
            store.cache_set(self.ns.apply(&key), entry);
        }
        Ok(true)
    }

    async fn delete_multiple(&self, keys: Vec<CacheKey>) -> Result<bool, CacheError> {
        key::check_keys(&keys)?;
        if keys.is_empty() {
            return Ok(true);
        }
        let Some(segment) = &self.segment else {
            return Ok(false);
        };
        let Ok(mut store) = segment.lock() else {
            return Ok(false);
        };
        for key in &keys {
            store.cache_remove(&self.ns.apply(key));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_adapter() -> MemoryAdapter {
        MemoryAdapter::new(&CacheConfig {
            enabled: true,
            ns: "t".to_string(),
            ..Default::default()
        })
    }

    fn disabled_adapter() -> MemoryAdapter {
        let mut config = CacheConfig::default();
        config.memory.max_entries = 0;
        MemoryAdapter::new(&config)
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let cache = ready_adapter();
        assert!(cache.set(&"k".into(), b"value".to_vec(), Ttl::Default).await);
        assert_eq!(cache.get(&"k".into()).await, Some(b"value".to_vec()));
        assert!(cache.has(&"k".into()).await);
    }

    #[tokio::test]
    async fn missing_key_is_a_miss() {
        let cache = ready_adapter();
        assert_eq!(cache.get(&"absent".into()).await, None);
        assert!(!cache.has(&"absent".into()).await);
    }

    #[tokio::test]
    async fn delete_of_absent_key_succeeds() {
        let cache = ready_adapter();
        assert!(cache.delete(&"absent".into()).await);

        cache.set(&"k".into(), b"v".to_vec(), Ttl::Default).await;
        assert!(cache.delete(&"k".into()).await);
        assert_eq!(cache.get(&"k".into()).await, None);
    }

    #[tokio::test]
    async fn clear_is_unsupported() {
        let cache = ready_adapter();
        cache.set(&"k".into(), b"v".to_vec(), Ttl::Default).await;
        assert!(!cache.clear().await);
        assert!(cache.has(&"k".into()).await);
    }

    #[tokio::test]
    async fn entries_expire_per_entry() {
        let cache = ready_adapter();
        cache.set(&"short".into(), b"v".to_vec(), Ttl::Seconds(1)).await;
        cache.set(&"long".into(), b"v".to_vec(), Ttl::Default).await;
        assert!(cache.has(&"short".into()).await);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(cache.get(&"short".into()).await, None);
        assert!(!cache.has(&"short".into()).await);
        assert!(cache.has(&"long".into()).await);
    }

    #[tokio::test]
    async fn negative_ttl_means_no_expiration() {
        let cache = ready_adapter();
        cache.set(&"k".into(), b"v".to_vec(), Ttl::Seconds(-10)).await;
        assert!(cache.has(&"k".into()).await);
    }

    #[tokio::test]
    async fn huge_ttl_does_not_panic() {
        let cache = ready_adapter();
        assert!(
            cache
                .set(&"k".into(), b"v".to_vec(), Ttl::Seconds(i64::MAX))
                .await
        );
        assert!(cache.has(&"k".into()).await);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let mut config = CacheConfig::default();
        config.ns = "a".to_string();
        let a = MemoryAdapter::new(&config);
        config.ns = "b".to_string();
        let b = MemoryAdapter::new(&config);

        a.set(&"k".into(), b"from-a".to_vec(), Ttl::Default).await;
        // Separate segments here, but the namespaced keys differ too.
        assert_eq!(b.get(&"k".into()).await, None);
    }

    #[tokio::test]
    async fn disabled_adapter_degrades_every_operation() {
        let cache = disabled_adapter();
        assert_eq!(cache.state(), AdapterState::Disabled);
        assert!(!cache.set(&"a".into(), b"1".to_vec(), Ttl::Default).await);
        assert_eq!(cache.get(&"a".into()).await, None);
        assert!(!cache.has(&"a".into()).await);
        assert!(!cache.delete(&"a".into()).await);
        assert!(!cache.clear().await);
        let result = cache
            .set_multiple(vec![("a".into(), b"1".to_vec())], Ttl::Default)
            .await;
        assert!(matches!(result, Ok(false)));
    }

    #[tokio::test]
    async fn disabled_adapter_still_rejects_malformed_batches() {
        let cache = disabled_adapter();
        let result = cache.get_multiple(vec!["ok".into(), "bad key".into()]).await;
        assert!(matches!(result, Err(CacheError::InvalidKey { position: 1, .. })));
    }

    #[tokio::test]
    async fn batch_set_then_batch_get_with_misses() {
        let cache = ready_adapter();
        let ok = cache
            .set_multiple(
                vec![("a".into(), b"1".to_vec()), ("b".into(), b"2".to_vec())],
                Ttl::Seconds(60),
            )
            .await
            .unwrap();
        assert!(ok);

        let values = cache
            .get_multiple(vec!["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[&CacheKey::from("a")], Some(b"1".to_vec()));
        assert_eq!(values[&CacheKey::from("b")], Some(b"2".to_vec()));
        assert_eq!(values[&CacheKey::from("c")], None);
    }

    #[tokio::test]
    async fn duplicate_batch_keys_collapse() {
        let cache = ready_adapter();
        cache.set(&"a".into(), b"1".to_vec(), Ttl::Default).await;
        let values = cache
            .get_multiple(vec!["a".into(), "a".into()])
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn malformed_batch_key_leaves_backend_untouched() {
        let cache = ready_adapter();
        let result = cache
            .set_multiple(
                vec![("good".into(), b"1".to_vec()), ("bad key".into(), b"2".to_vec())],
                Ttl::Default,
            )
            .await;
        assert!(matches!(result, Err(CacheError::InvalidKey { .. })));
        // Validation precedes execution: not even the well-formed entry landed.
        assert_eq!(cache.get(&"good".into()).await, None);
    }

    #[tokio::test]
    async fn vacuous_batches_succeed() {
        let cache = ready_adapter();
        assert!(cache.get_multiple(vec![]).await.unwrap().is_empty());
        assert!(cache.set_multiple(vec![], Ttl::Default).await.unwrap());
        assert!(cache.delete_multiple(vec![]).await.unwrap());
    }

    // Same outcome on a disabled adapter: an empty batch has nothing to
    // fail, so every backend reports vacuous success.
    #[tokio::test]
    async fn vacuous_batches_succeed_even_disabled() {
        let cache = disabled_adapter();
        assert!(cache.get_multiple(vec![]).await.unwrap().is_empty());
        assert!(cache.set_multiple(vec![], Ttl::Default).await.unwrap());
        assert!(cache.delete_multiple(vec![]).await.unwrap());
    }

    #[tokio::test]
    async fn delete_multiple_removes_listed_keys() {
        let cache = ready_adapter();
        cache.set(&"a".into(), b"1".to_vec(), Ttl::Default).await;
        cache.set(&"b".into(), b"2".to_vec(), Ttl::Default).await;
        assert!(cache.delete_multiple(vec!["a".into(), "b".into()]).await.unwrap());
        assert_eq!(cache.get(&"a".into()).await, None);
        assert_eq!(cache.get(&"b".into()).await, None);
    }

    #[tokio::test]
    async fn integer_keys_work() {
        let cache = ready_adapter();
        let key = CacheKey::Int(42);
        assert!(cache.set(&key, b"answer".to_vec(), Ttl::Default).await);
        assert_eq!(cache.get(&key).await, Some(b"answer".to_vec()));
    }
}
