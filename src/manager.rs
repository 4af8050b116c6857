//! The cache facade and the optional process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::adapter::{AdapterState, CacheAdapter};
use crate::config::{Backend, CacheConfig};
use crate::error::CacheError;
use crate::key::CacheKey;
use crate::memcached::MemcachedAdapter;
use crate::memory::MemoryAdapter;
use crate::null::NullAdapter;
use crate::redis::RedisAdapter;
use crate::ttl::Ttl;

/// Process-wide cache instance.
static CACHE: OnceCell<Cache> = OnceCell::const_new();

/// Initializes the process-wide cache.
///
/// Call once during startup; later calls return the existing instance.
pub async fn init_cache(config: CacheConfig) -> Result<&'static Cache, CacheError> {
    CACHE
        .get_or_try_init(|| async { Cache::new(config).await })
        .await
}

/// The process-wide cache, or `None` before [`init_cache`] ran.
pub fn get_cache() -> Option<&'static Cache> {
    CACHE.get()
}

/// The type callers hold: the configured adapter behind the shared
/// contract. Construction selects the backend; everything else proxies.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheAdapter>,
    config: CacheConfig,
}

impl Cache {
    /// Selects and constructs the configured backend.
    ///
    /// `enabled = false` yields the null backend regardless of `backend`.
    /// Only the redis backend can fail here; the memory and memcached
    /// backends degrade silently to the disabled state instead.
    pub async fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheAdapter> = if !config.enabled {
            Arc::new(NullAdapter::new())
        } else {
            match config.backend {
                Backend::Memory => Arc::new(MemoryAdapter::new(&config)),
                Backend::Memcached => Arc::new(MemcachedAdapter::new(&config)),
                Backend::Redis => Arc::new(RedisAdapter::new(&config).await?),
                Backend::Null => Arc::new(NullAdapter::new()),
            }
        };
        tracing::debug!(backend = ?config.backend, state = ?backend.state(), "cache constructed");
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &Arc<dyn CacheAdapter> {
        &self.backend
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> AdapterState {
        self.backend.state()
    }

    pub async fn get(&self, key: impl Into<CacheKey>) -> Option<Vec<u8>> {
        self.backend.get(&key.into()).await
    }

    /// Fetch with a caller-supplied fallback for misses.
    pub async fn get_or(&self, key: impl Into<CacheKey>, default: Vec<u8>) -> Vec<u8> {
        self.backend.get(&key.into()).await.unwrap_or(default)
    }

    pub async fn set(&self, key: impl Into<CacheKey>, value: Vec<u8>, ttl: Ttl) -> bool {
        self.backend.set(&key.into(), value, ttl).await
    }

    pub async fn delete(&self, key: impl Into<CacheKey>) -> bool {
        self.backend.delete(&key.into()).await
    }

    pub async fn has(&self, key: impl Into<CacheKey>) -> bool {
        self.backend.has(&key.into()).await
    }

    pub async fn clear(&self) -> bool {
        self.backend.clear().await
    }

    pub async fn get_multiple<I, K>(
        &self,
        keys: I,
    ) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.backend.get_multiple(keys).await
    }

    /// Batch fetch with a caller-supplied fallback filled in for misses:
    /// one entry per distinct input key, always.
    pub async fn get_multiple_or<I, K>(
        &self,
        keys: I,
        default: Vec<u8>,
    ) -> Result<HashMap<CacheKey, Vec<u8>>, CacheError>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        let values = self.get_multiple(keys).await?;
        Ok(values
            .into_iter()
            .map(|(key, hit)| (key, hit.unwrap_or_else(|| default.clone())))
            .collect())
    }

    pub async fn set_multiple<I, K>(&self, entries: I, ttl: Ttl) -> Result<bool, CacheError>
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<CacheKey>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        self.backend.set_multiple(entries, ttl).await
    }

    pub async fn delete_multiple<I, K>(&self, keys: I) -> Result<bool, CacheError>
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        self.backend.delete_multiple(keys).await
    }
}
