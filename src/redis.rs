//! Redis adapter using a bb8 connection pool.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client};
use bb8::{Pool, PooledConnection};

use crate::adapter::{AdapterState, CacheAdapter};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::key::{self, CacheKey, KeyNamespacer};
use crate::ttl::{Ttl, TtlPolicy};

type RedisPool = Pool<Client>;

/// Parses one MGET-plus-EXISTS pipeline reply into the per-key map. The
/// first row is the MGET value list, followed by one EXISTS row per key; a
/// key is a hit only when both agree.
fn collate_reply(
    keys: &[CacheKey],
    raw: Vec<::redis::Value>,
) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError> {
    let mut rows = raw.into_iter();
    let values: Vec<Option<Vec<u8>>> = match rows.next() {
        Some(row) => {
            redis::from_redis_value(row).map_err(|e| CacheError::Connection(e.to_string()))?
        }
        None => return Err(CacheError::Connection("empty pipeline reply".to_string())),
    };

    let mut out = HashMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let exists = match rows.next() {
            Some(row) => redis::from_redis_value::<bool>(row)
                .map_err(|e| CacheError::Connection(e.to_string()))?,
            None => false,
        };
        let hit = if exists {
            values.get(i).cloned().flatten()
        } else {
            None
        };
        out.insert(key.clone(), hit);
    }
    Ok(out)
}

/// Writes every entry, reporting overall success only when all of them
/// landed. Every entry is attempted; a failure does not stop the loop and
/// earlier writes stay in place.
async fn write_all<F, Fut>(entries: Vec<(CacheKey, Vec<u8>)>, mut write: F) -> bool
where
    F: FnMut(CacheKey, Vec<u8>) -> Fut,
    Fut: std::future::Future<Output = Result<(), CacheError>>,
{
    let mut ok = true;
    for (key, value) in entries {
        if let Err(e) = write(key.clone(), value).await {
            tracing::warn!(error = %e, %key, "redis set failed");
            ok = false;
        }
    }
    ok
}

/// Redis-backed cache.
///
/// This is the one adapter whose construction can fail: the pool is built
/// and pinged up front, so an unreachable server surfaces as
/// [`CacheError::Connection`] instead of a silently disabled adapter. Once
/// constructed it stays `Ready`; runtime transport errors degrade the single
/// call and are logged, never propagated.
pub struct RedisAdapter {
    pool: RedisPool,
    ns: KeyNamespacer,
    ttl: TtlPolicy,
}

impl RedisAdapter {
    pub async fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.redis.url.as_str())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.redis.pool_size)
            .connection_timeout(Duration::from_secs(config.redis.connection_timeout))
            .build(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        // Reachability check; bb8 may otherwise defer the first connect.
        let mut conn = pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        drop(conn);

        Ok(Self {
            pool,
            ns: KeyNamespacer::new(&config.ns),
            ttl: TtlPolicy::new(config.ttl),
        })
    }

    async fn conn(&self) -> Result<PooledConnection<'_, Client>, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    async fn try_get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn().await?;
        let nskey = self.ns.apply(key);

        // One pipelined round trip: the existence check distinguishes a
        // stored empty value from an absent key.
        let (value, exists): (Option<Vec<u8>>, bool) = redis::pipe()
            .atomic()
            .get(&nskey)
            .exists(&nskey)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(if exists { value } else { None })
    }

    async fn try_set(&self, key: CacheKey, value: Vec<u8>, ttl: Ttl) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let nskey = self.ns.apply(&key);
        let result = match self.ttl.resolve(ttl, None) {
            Some(secs) => {
                let conn_ref: &mut MultiplexedConnection = &mut conn;
                conn_ref.set_ex::<_, _, ()>(&nskey, value, secs).await
            }
            // No expiration: plain SET.
            None => {
                let conn_ref: &mut MultiplexedConnection = &mut conn;
                conn_ref.set::<_, _, ()>(&nskey, value).await
            }
        };
        result.map_err(|e| CacheError::Connection(e.to_string()))
    }

    async fn try_delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let nskey = self.ns.apply(key);
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .del::<_, ()>(&nskey)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    async fn try_has(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let nskey = self.ns.apply(key);
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .exists(&nskey)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    async fn try_get_multiple(
        &self,
        keys: &[CacheKey],
    ) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError> {
        let mut conn = self.conn().await?;
        let nskeys: Vec<String> = keys.iter().map(|k| self.ns.apply(k)).collect();

        // One round trip: MGET for the values plus an EXISTS per key; a key
        // is a hit only when both agree.
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("MGET").arg(&nskeys);
        for nskey in &nskeys {
            pipe.cmd("EXISTS").arg(nskey);
        }
        let raw: Vec<redis::Value> = pipe
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        collate_reply(keys, raw)
    }

    async fn try_delete_multiple(&self, keys: &[CacheKey]) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let nskeys: Vec<String> = keys.iter().map(|k| self.ns.apply(k)).collect();
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .del::<_, ()>(nskeys)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CacheAdapter for RedisAdapter {
    fn state(&self) -> AdapterState {
        AdapterState::Ready
    }

    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, %key, "redis get failed");
                None
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Ttl) -> bool {
        match self.try_set(key.clone(), value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, %key, "redis set failed");
                false
            }
        }
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        // DEL of an absent key still counts as deleted.
        match self.try_delete(key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, %key, "redis delete failed");
                false
            }
        }
    }

    async fn has(&self, key: &CacheKey) -> bool {
        match self.try_has(key).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(error = %e, %key, "redis exists failed");
                false
            }
        }
    }

    async fn get_multiple(
        &self,
        keys: Vec<CacheKey>,
    ) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError> {
        key::check_keys(&keys)?;
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        match self.try_get_multiple(&keys).await {
            Ok(values) => Ok(values),
            Err(e) => {
                tracing::warn!(error = %e, "redis multi-get failed");
                Ok(keys.into_iter().map(|key| (key, None)).collect())
            }
        }
    }

    /// Redis has no multi-set with a per-key TTL, so entries go out as a
    /// sequential loop of single sets.
    async fn set_multiple(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        ttl: Ttl,
    ) -> Result<bool, CacheError> {
        key::check_entries(&entries)?;
        Ok(write_all(entries, |key, value| self.try_set(key, value, ttl)).await)
    }

    async fn delete_multiple(&self, keys: Vec<CacheKey>) -> Result<bool, CacheError> {
        key::check_keys(&keys)?;
        if keys.is_empty() {
            return Ok(true);
        }
        match self.try_delete_multiple(&keys).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "redis multi-delete failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ::redis::Value;

    use super::*;

    #[test]
    fn pipeline_reply_collates_hits_and_misses() {
        let keys = vec![CacheKey::from("a"), CacheKey::from("b")];
        let raw = vec![
            Value::Array(vec![Value::BulkString(b"1".to_vec()), Value::Nil]),
            Value::Int(1),
            Value::Int(0),
        ];
        let values = collate_reply(&keys, raw).unwrap();
        assert_eq!(values[&CacheKey::from("a")], Some(b"1".to_vec()));
        assert_eq!(values[&CacheKey::from("b")], None);
    }

    #[test]
    fn stored_empty_value_is_still_a_hit() {
        let keys = vec![CacheKey::from("a")];
        let raw = vec![
            Value::Array(vec![Value::BulkString(Vec::new())]),
            Value::Int(1),
        ];
        let values = collate_reply(&keys, raw).unwrap();
        assert_eq!(values[&CacheKey::from("a")], Some(Vec::new()));
    }

    #[tokio::test]
    async fn mid_batch_write_failure_reports_false_and_continues() {
        let written: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let entries: Vec<(CacheKey, Vec<u8>)> = vec![
            ("a".into(), b"1".to_vec()),
            ("b".into(), b"2".to_vec()),
            ("c".into(), b"3".to_vec()),
        ];
        let ok = write_all(entries, |key, _value| {
            let written = &written;
            async move {
                if key.to_string() == "b" {
                    return Err(CacheError::Connection("write refused".to_string()));
                }
                written.lock().unwrap().push(key.to_string());
                Ok(())
            }
        })
        .await;

        // Overall failure, but the entries around the bad one landed.
        assert!(!ok);
        assert_eq!(written.into_inner().unwrap(), vec!["a", "c"]);
    }

    // Unlike the other backends, redis unreachability is a loud
    // construction-time error.
    #[tokio::test]
    async fn unreachable_server_fails_construction() {
        let mut config = CacheConfig {
            enabled: true,
            backend: crate::config::Backend::Redis,
            ..Default::default()
        };
        config.redis.url = "redis://127.0.0.1:1".to_string();
        config.redis.connection_timeout = 1;

        let result = RedisAdapter::new(&config).await;
        assert!(matches!(result, Err(CacheError::Connection(_))));
    }
}
