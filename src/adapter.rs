//! The unified adapter contract.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CacheError;
use crate::key::CacheKey;
use crate::ttl::Ttl;

/// Whether an adapter's backend facility was usable at construction.
///
/// Decided once, inside construction, and immutable for the adapter's
/// lifetime: a `Disabled` adapter never retries becoming ready, and a
/// `Ready` adapter never flips to `Disabled` after a failed call. The call
/// is reported as failed and the adapter stays `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Ready,
    Disabled,
}

/// Contract every cache backend implements.
///
/// Single-key operations never error: a disabled adapter or a failing
/// backend degrades to the documented miss/no-op value. Batch operations
/// validate every key up front and are the only place [`CacheError`] is
/// raised; validation runs before the disabled-state check, so a disabled
/// adapter still rejects a malformed batch. A validated empty batch touches
/// no backend and reports its vacuous success value on every adapter,
/// disabled included. Once validation passes, no batch is required to apply
/// atomically at the backend: a partial failure reports overall failure
/// without rolling back entries already written.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// The construction-time state tag.
    fn state(&self) -> AdapterState;

    /// Fetches a value. `None` means absent, expired, unreadable, or the
    /// adapter is disabled.
    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;

    /// Stores a value with an optional TTL. `false` when the adapter is
    /// disabled or the backend rejects the write.
    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Ttl) -> bool;

    /// Removes a value. `true` if removed or already absent; `false` when
    /// the adapter is disabled or the backend call fails.
    async fn delete(&self, key: &CacheKey) -> bool;

    /// Existence check. `false`, not an error, when the adapter is disabled.
    async fn has(&self, key: &CacheKey) -> bool;

    /// Not supported: the contract offers no namespace-scoped clear that
    /// every backend could honor safely.
    async fn clear(&self) -> bool {
        false
    }

    /// Fetches many values in one backend round trip. The result has one
    /// entry per distinct input key (`None` on miss); duplicate input keys
    /// collapse to one entry.
    async fn get_multiple(
        &self,
        keys: Vec<CacheKey>,
    ) -> Result<HashMap<CacheKey, Option<Vec<u8>>>, CacheError>;

    /// Stores many entries. `Ok(true)` only if every entry succeeded; every
    /// entry is attempted even after one fails.
    async fn set_multiple(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        ttl: Ttl,
    ) -> Result<bool, CacheError>;

    /// Deletes many keys. `Ok(true)` when the batch delete was issued.
    async fn delete_multiple(&self, keys: Vec<CacheKey>) -> Result<bool, CacheError>;
}
