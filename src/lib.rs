//! Uniform caching facade with interchangeable backends.
//!
//! One contract (get, set, delete, has, clear plus the multi-key variants)
//! implemented by four backends:
//! - memory (in-process, bounded, fastest)
//! - memcached (distributed memory-object cache)
//! - redis (networked key/value/TTL store)
//! - null (caching turned off)
//!
//! Callers hold a [`Cache`] and depend only on the contract; the backend is
//! picked by configuration. A backend that is unavailable or failing never
//! turns into an application-visible outage: reads degrade to misses and
//! writes report `false`. The one loud runtime condition is a malformed key
//! in a batch operation, rejected before any backend call.
//!
//! # Configuration
//!
//! ```toml
//! enabled = true
//! backend = "redis"   # or "memory", "memcached", "null"
//! ttl = 300           # default TTL in seconds, 0 = no expiration
//! ns = "app1"         # bare key prefix, no separator
//!
//! [memory]
//! max_entries = 1000
//!
//! [memcached]
//! servers = ["memcache://127.0.0.1:11211"]
//!
//! [redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 4
//! connection_timeout = 5
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let cache = Cache::new(CacheConfig::from_file("cache.toml")?).await?;
//! cache.set("greeting", b"hello".to_vec(), Ttl::Seconds(60)).await;
//! let value = cache.get_or("greeting", b"fallback".to_vec()).await;
//! ```

mod adapter;
mod config;
mod error;
mod key;
#[macro_use]
mod macros;
mod manager;
mod memcached;
mod memory;
mod null;
mod redis;
mod ttl;

pub use self::adapter::{AdapterState, CacheAdapter};
pub use self::config::{Backend, CacheConfig, MemcachedConfig, MemoryConfig, RedisConfig};
pub use self::error::CacheError;
pub use self::key::{CacheKey, KeyNamespacer};
pub use self::manager::{Cache, get_cache, init_cache};
pub use self::memcached::MemcachedAdapter;
pub use self::memory::MemoryAdapter;
pub use self::null::NullAdapter;
pub use self::redis::RedisAdapter;
pub use self::ttl::{Ttl, TtlPolicy};
