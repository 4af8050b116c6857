//! Null adapter: caching turned off.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::adapter::{AdapterState, CacheAdapter};
use crate::error::CacheError;
use crate::key::{self, CacheKey};
use crate::ttl::Ttl;

/// Adapter with no backend at all, permanently disabled by design.
///
/// Every read is a miss and every write a no-op. Batch keys are still
/// validated, so configuration cannot mask a caller bug.
pub struct NullAdapter;

impl NullAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheAdapter for NullAdapter {
    fn state(&self) -> AdapterState {
        AdapterState::Disabled
    }

    async fn get(&self, _key: &CacheKey) -> Option<Vec<u8>> {
        None
    }

    async fn set(&self, _key: &CacheKey, _value: Vec<u8>, _ttl: Ttl) -> bool {
        false
    }

    async fn delete(&self, _key: &CacheKey) -> bool {
        false
    }

    async fn has(&self, _key: &CacheKey) -> bool {
        false
    }

    async fn get_multiple(
        &self,
        keys: Vec<CacheKey>,
    ) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError> {
        key::check_keys(&keys)?;
        Ok(keys.into_iter().map(|key| (key, None)).collect())
    }

    async fn set_multiple(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        _ttl: Ttl,
    ) -> Result<bool, CacheError> {
        key::check_entries(&entries)?;
        // An empty batch has nothing to fail; the vacuous success applies
        // even here.
        Ok(entries.is_empty())
    }

    async fn delete_multiple(&self, keys: Vec<CacheKey>) -> Result<bool, CacheError> {
        key::check_keys(&keys)?;
        Ok(keys.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_operation_degrades() {
        let cache = NullAdapter::new();
        assert_eq!(cache.state(), AdapterState::Disabled);
        assert!(!cache.set(&"a".into(), b"1".to_vec(), Ttl::Default).await);
        assert_eq!(cache.get(&"a".into()).await, None);
        assert!(!cache.has(&"a".into()).await);
        assert!(!cache.delete(&"a".into()).await);
        assert!(!cache.clear().await);
    }

    #[tokio::test]
    async fn batch_reads_fill_with_misses() {
        let cache = NullAdapter::new();
        let values = cache
            .get_multiple(vec!["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(values.len(), 2);
        assert!(values.values().all(Option::is_none));

        assert!(!cache
            .set_multiple(vec![("a".into(), b"1".to_vec())], Ttl::Default)
            .await
            .unwrap());
        assert!(!cache.delete_multiple(vec!["a".into()]).await.unwrap());
    }

    #[tokio::test]
    async fn vacuous_batches_succeed() {
        let cache = NullAdapter::new();
        assert!(cache.get_multiple(vec![]).await.unwrap().is_empty());
        assert!(cache.set_multiple(vec![], Ttl::Default).await.unwrap());
        assert!(cache.delete_multiple(vec![]).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_batches_still_raise() {
        let cache = NullAdapter::new();
        let result = cache.get_multiple(vec!["".into()]).await;
        assert!(matches!(
            result,
            Err(CacheError::InvalidKey { position: 0, .. })
        ));
    }
}
