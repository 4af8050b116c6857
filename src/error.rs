//! Cache error types.

use thiserror::Error;

/// Errors surfaced by the cache core.
///
/// Runtime backend failures are never represented here; they degrade to the
/// operation's documented miss/no-op value. The only loud conditions are a
/// malformed batch key, an unreachable redis server at construction, and a
/// configuration file that cannot be loaded.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A batch operation received a malformed key. Raised before any
    /// backend call is issued.
    #[error("invalid cache key at position {position} ({key:?}): {reason}")]
    InvalidKey {
        position: usize,
        key: String,
        reason: &'static str,
    },

    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache configuration error: {0}")]
    Config(String),
}
