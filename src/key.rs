//! Cache keys, namespacing and batch validation.

use std::fmt;

use crate::error::CacheError;

/// Longest key memcached's text protocol accepts; used as the uniform limit
/// so a key valid for one backend is valid for all of them.
const MAX_KEY_LEN: usize = 250;

/// A logical cache key: string or integer identity.
///
/// Uniqueness is the caller's concern. Integer keys render in decimal and
/// are always well-formed; string keys must be non-empty, at most 250 bytes,
/// and free of ASCII control characters and spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Str(String),
    Int(i64),
}

impl CacheKey {
    /// Checks well-formedness. Returns the reason on failure.
    pub fn check(&self) -> Result<(), &'static str> {
        let CacheKey::Str(s) = self else {
            return Ok(());
        };
        if s.is_empty() {
            return Err("key is empty");
        }
        if s.len() > MAX_KEY_LEN {
            return Err("key exceeds 250 bytes");
        }
        if s.bytes().any(|b| b.is_ascii_control() || b == b' ') {
            return Err("key contains control characters or spaces");
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Str(s) => f.write_str(s),
            CacheKey::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey::Str(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        CacheKey::Str(s)
    }
}

impl From<&String> for CacheKey {
    fn from(s: &String) -> Self {
        CacheKey::Str(s.clone())
    }
}

impl From<i64> for CacheKey {
    fn from(i: i64) -> Self {
        CacheKey::Int(i)
    }
}

/// Prefixes logical keys with the configured namespace.
///
/// No separator is inserted; two adapters with different namespaces over the
/// same backend never observe each other's entries, and avoiding prefix
/// collisions between namespaces is the configurer's responsibility.
#[derive(Debug, Clone)]
pub struct KeyNamespacer {
    ns: String,
}

impl KeyNamespacer {
    pub fn new(ns: &str) -> Self {
        Self { ns: ns.to_string() }
    }

    pub fn apply(&self, key: &CacheKey) -> String {
        format!("{}{}", self.ns, key)
    }
}

/// Validates every key of a batch operation, fail-fast on the first
/// malformed key. No backend call may be issued when this fails.
pub(crate) fn check_keys(keys: &[CacheKey]) -> Result<(), CacheError> {
    for (position, key) in keys.iter().enumerate() {
        key.check().map_err(|reason| CacheError::InvalidKey {
            position,
            key: key.to_string(),
            reason,
        })?;
    }
    Ok(())
}

/// Batch-entry variant of [`check_keys`]; values are opaque and unchecked.
pub(crate) fn check_entries(entries: &[(CacheKey, Vec<u8>)]) -> Result<(), CacheError> {
    for (position, (key, _)) in entries.iter().enumerate() {
        key.check().map_err(|reason| CacheError::InvalidKey {
            position,
            key: key.to_string(),
            reason,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_keys_are_always_well_formed() {
        assert!(CacheKey::Int(-7).check().is_ok());
        assert_eq!(CacheKey::Int(-7).to_string(), "-7");
    }

    #[test]
    fn string_key_well_formedness() {
        assert!(CacheKey::from("user:42").check().is_ok());
        assert!(CacheKey::from("").check().is_err());
        assert!(CacheKey::from("has space").check().is_err());
        assert!(CacheKey::from("line\nbreak").check().is_err());
        assert!(CacheKey::from("x".repeat(251).as_str()).check().is_err());
        assert!(CacheKey::from("x".repeat(250).as_str()).check().is_ok());
    }

    #[test]
    fn namespace_is_a_bare_prefix() {
        let ns = KeyNamespacer::new("app1");
        assert_eq!(ns.apply(&CacheKey::from("user")), "app1user");
        assert_eq!(ns.apply(&CacheKey::Int(9)), "app19");

        let empty = KeyNamespacer::new("");
        assert_eq!(empty.apply(&CacheKey::from("user")), "user");
    }

    #[test]
    fn batch_validation_is_fail_fast_with_position() {
        let keys = vec![
            CacheKey::from("ok"),
            CacheKey::from("bad key"),
            CacheKey::from(""),
        ];
        match check_keys(&keys) {
            Err(CacheError::InvalidKey { position, key, .. }) => {
                assert_eq!(position, 1);
                assert_eq!(key, "bad key");
            }
            other => panic!("expected InvalidKey, got {other:?}"),
        }
    }

    #[test]
    fn empty_batch_is_vacuously_valid() {
        assert!(check_keys(&[]).is_ok());
        assert!(check_entries(&[]).is_ok());
    }
}
