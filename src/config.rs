//! Cache configuration structures and loading.
//!
//! Every recognized option is an explicit field with a serde default, so a
//! partial configuration file is always valid and unrecognized options are
//! ignored.

use std::path::Path;

use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::CacheError;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "CACHET";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Cache backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Memcached,
    Redis,
    Null,
}

/// Memory backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of entries held by the segment. Zero means no usable
    /// segment: the adapter constructs permanently disabled.
    #[serde(default = "default_memory_max_entries")]
    pub max_entries: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_memory_max_entries(),
        }
    }
}

/// Memcached backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemcachedConfig {
    /// Server endpoints, `memcache://host:port` URLs.
    #[serde(default = "default_memcached_servers")]
    pub servers: Vec<String>,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            servers: default_memcached_servers(),
        }
    }
}

/// Redis backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds.
    #[serde(default = "default_redis_connection_timeout")]
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            connection_timeout: default_redis_connection_timeout(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct CacheConfig {
    /// Whether caching is enabled. When false the null backend is selected
    /// regardless of `backend`.
    #[serde(default)]
    pub enabled: bool,

    /// Cache backend type.
    #[serde(default)]
    pub backend: Backend,

    /// Default TTL in seconds applied when an operation passes
    /// `Ttl::Default`. Zero means no expiration.
    #[serde(default)]
    pub ttl: i64,

    /// Namespace prefixed to every key, with no separator.
    #[serde(default)]
    pub ns: String,

    /// Memory backend settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Memcached backend settings.
    #[serde(default)]
    pub memcached: MemcachedConfig,

    /// Redis backend settings.
    #[serde(default)]
    pub redis: RedisConfig,
}

impl CacheConfig {
    /// Loads configuration from a TOML file, with `CACHET__*` environment
    /// variables taking precedence (for example `CACHET__REDIS__URL`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        Config::builder()
            .add_source(File::new(&path, FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()
            .map_err(|e| CacheError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CacheError::Config(e.to_string()))
    }
}

fn default_memory_max_entries() -> usize {
    1000
}

fn default_memcached_servers() -> Vec<String> {
    vec!["memcache://127.0.0.1:11211".to_string()]
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    4
}

fn default_redis_connection_timeout() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_defaults() {
        let config: CacheConfig = toml::from_str("").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.ttl, 0);
        assert_eq!(config.ns, "");
        assert_eq!(config.memory.max_entries, 1000);
        assert_eq!(config.redis.pool_size, 4);
        assert_eq!(
            config.memcached.servers,
            vec!["memcache://127.0.0.1:11211".to_string()]
        );
    }

    #[test]
    fn unrecognized_options_are_ignored() {
        let config: CacheConfig = toml::from_str(
            r#"
            enabled = true
            backend = "redis"
            shiny_new_option = "whatever"

            [redis]
            url = "redis://cache.internal:6380"
            extra = 42
            "#,
        )
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.backend, Backend::Redis);
        assert_eq!(config.redis.url, "redis://cache.internal:6380");
        assert_eq!(config.redis.connection_timeout, 5);
    }

    #[test]
    fn backend_names_are_lowercase() {
        for (name, backend) in [
            ("memory", Backend::Memory),
            ("memcached", Backend::Memcached),
            ("redis", Backend::Redis),
            ("null", Backend::Null),
        ] {
            let config: CacheConfig =
                toml::from_str(&format!("backend = \"{name}\"")).unwrap();
            assert_eq!(config.backend, backend);
        }
    }
}
