//! Memcached adapter over the synchronous `memcache` client.
//!
//! The client is thread-safe (one mutex per pooled connection), so the
//! adapter bridges it into the async contract with `spawn_blocking` and an
//! `Arc` handle. If the servers cannot be reached at construction the
//! adapter degrades silently to the disabled state, matching the other
//! non-redis backends.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::adapter::{AdapterState, CacheAdapter};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::key::{self, CacheKey, KeyNamespacer};
use crate::ttl::{Ttl, TtlPolicy};

/// Pairs each requested key with its fetched value. A key absent from the
/// fetched map is a miss; duplicate input keys collapse to one entry and
/// keep the hit.
fn collate(
    ns: &KeyNamespacer,
    keys: Vec<CacheKey>,
    fetched: &HashMap<String, Vec<u8>>,
) -> HashMap<CacheKey, Option<Vec<u8>>> {
    let mut values = HashMap::with_capacity(keys.len());
    for key in keys {
        let hit = fetched.get(&ns.apply(&key)).cloned();
        values.insert(key, hit);
    }
    values
}

/// Writes every entry, reporting overall success only when all of them
/// landed. A failed write does not stop the loop, so earlier entries stay
/// in place.
fn store_all<E: std::fmt::Display>(
    items: &[(String, Vec<u8>)],
    mut write: impl FnMut(&str, &[u8]) -> Result<(), E>,
) -> bool {
    let mut ok = true;
    for (nskey, value) in items {
        if let Err(e) = write(nskey, value) {
            tracing::warn!(error = %e, key = %nskey, "memcached set failed");
            ok = false;
        }
    }
    ok
}

pub struct MemcachedAdapter {
    client: Option<Arc<memcache::Client>>,
    ns: KeyNamespacer,
    ttl: TtlPolicy,
}

impl MemcachedAdapter {
    pub fn new(config: &CacheConfig) -> Self {
        let servers: Vec<&str> = config.memcached.servers.iter().map(String::as_str).collect();
        let client = match memcache::Client::connect(servers) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "memcached unavailable, adapter disabled");
                None
            }
        };
        Self {
            client,
            ns: KeyNamespacer::new(&config.ns),
            ttl: TtlPolicy::new(config.ttl),
        }
    }

    /// Runs one client call on the blocking pool, swallowing any error into
    /// `None` so backend trouble never crosses the contract boundary.
    async fn run<T, F>(&self, op: &'static str, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&memcache::Client) -> Result<T, memcache::MemcacheError> + Send + 'static,
    {
        let client = Arc::clone(self.client.as_ref()?);
        match tokio::task::spawn_blocking(move || f(&client)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, op, "memcached call failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, op, "memcached task panicked");
                None
            }
        }
    }

    fn expiration(&self, ttl: Ttl) -> u32 {
        // 0 is the protocol's "never expire".
        let secs = self.ttl.resolve(ttl, Some(0)).unwrap_or(0);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}

#[async_trait]
impl CacheAdapter for MemcachedAdapter {
    fn state(&self) -> AdapterState {
        if self.client.is_some() {
            AdapterState::Ready
        } else {
            AdapterState::Disabled
        }
    }

    /// Implemented as a one-key multi-get: the client exposes no plain
    /// fetch that distinguishes a miss from an empty value.
    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let nskey = self.ns.apply(key);
        let lookup = nskey.clone();
        self.run("get", move |client| {
            client.gets::<Vec<u8>>(&[lookup.as_str()])
        })
        .await
        .and_then(|mut fetched| fetched.remove(&nskey))
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Ttl) -> bool {
        let nskey = self.ns.apply(key);
        let expiration = self.expiration(ttl);
        self.run("set", move |client| {
            client.set(nskey.as_str(), value.as_slice(), expiration)
        })
        .await
        .is_some()
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        let nskey = self.ns.apply(key);
        // The client reports whether the key existed; absent still counts
        // as deleted under the contract.
        self.run("delete", move |client| client.delete(nskey.as_str()))
            .await
            .is_some()
    }

    /// Zero-value multi-get; memcached has no dedicated existence command.
    async fn has(&self, key: &CacheKey) -> bool {
        let nskey = self.ns.apply(key);
        let lookup = nskey.clone();
        self.run("has", move |client| {
            client.gets::<Vec<u8>>(&[lookup.as_str()])
        })
        .await
        .is_some_and(|fetched| fetched.contains_key(&nskey))
    }

    async fn get_multiple(
        &self,
        keys: Vec<CacheKey>,
    ) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError> {
        key::check_keys(&keys)?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let nskeys: Vec<String> = keys.iter().map(|k| self.ns.apply(k)).collect();
        let fetched = self
            .run("get_multiple", move |client| {
                let refs: Vec<&str> = nskeys.iter().map(String::as_str).collect();
                client.gets::<Vec<u8>>(&refs)
            })
            .await
            .unwrap_or_default();

        Ok(collate(&self.ns, keys, &fetched))
    }

    /// The client has no multi-set, so entries are written one by one;
    /// every entry is attempted and the aggregate is true only if all
    /// writes landed.
    async fn set_multiple(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        ttl: Ttl,
    ) -> Result<bool, CacheError> {
        key::check_entries(&entries)?;
        if entries.is_empty() {
            return Ok(true);
        }
        let expiration = self.expiration(ttl);
        let items: Vec<(String, Vec<u8>)> = entries
            .into_iter()
            .map(|(key, value)| (self.ns.apply(&key), value))
            .collect();
        let ok = self
            .run("set_multiple", move |client| {
                Ok(store_all(&items, |nskey, value| {
                    client.set(nskey, value, expiration)
                }))
            })
            .await;
        Ok(ok.unwrap_or(false))
    }

    async fn delete_multiple(&self, keys: Vec<CacheKey>) -> Result<bool, CacheError> {
        key::check_keys(&keys)?;
        if keys.is_empty() {
            return Ok(true);
        }
        let nskeys: Vec<String> = keys.iter().map(|k| self.ns.apply(k)).collect();
        let ok = self
            .run("delete_multiple", move |client| {
                let mut ok = true;
                for nskey in &nskeys {
                    if let Err(e) = client.delete(nskey.as_str()) {
                        tracing::warn!(error = %e, key = %nskey, "memcached delete failed");
                        ok = false;
                    }
                }
                Ok(ok)
            })
            .await;
        Ok(ok.unwrap_or(false))
    }
}
