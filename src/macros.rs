//! Convenience macro caching function results through the facade.

/// Wraps an async function with read-through caching.
///
/// The wrapped function's success value is serialized with `serde_json` and
/// stored under `name` plus the generated key; later calls return the
/// cached value until it expires. Cache trouble never fails the call: a
/// miss or a failed write just runs the function.
///
/// # Usage
///
/// ```ignore
/// cached_fn! {
///     name = "rate",
///     ttl = 300,
///     key = |pair: &String| pair.clone(),
///     async fn exchange_rate(cache: &Cache, pair: String) -> Result<f64, RateError> {
///         fetch_rate_from_upstream(&pair).await
///     }
/// }
/// ```
///
/// Omitting the `cache` parameter uses the process-wide instance from
/// [`init_cache`](crate::init_cache); before initialization the function
/// simply runs uncached.
#[macro_export]
macro_rules! cached_fn {
    // Version with explicit cache parameter
    (
        name = $cache_name:literal,
        $(ttl = $ttl:expr,)?
        key = |$($key_arg:ident : $key_ty:ty),* $(,)?| $key_expr:expr,
        async fn $fn_name:ident($cache_param:ident : &Cache $(, $arg:ident : $arg_ty:ty)* $(,)?) -> $ret_ty:ty $body:block
    ) => {
        pub async fn $fn_name(
            $cache_param: &$crate::Cache,
            $($arg: $arg_ty),*
        ) -> $ret_ty {
            let cache_key = {
                $(let $key_arg: $key_ty = &$arg;)*
                format!("{}:{}", $cache_name, $key_expr)
            };
            $crate::cached_fn!(@read_through $cache_param, cache_key, ($($ttl)?), $ret_ty, $body)
        }
    };

    // Version using the process-wide cache (no cache parameter)
    (
        name = $cache_name:literal,
        $(ttl = $ttl:expr,)?
        key = |$($key_arg:ident : $key_ty:ty),* $(,)?| $key_expr:expr,
        async fn $fn_name:ident($($arg:ident : $arg_ty:ty),* $(,)?) -> $ret_ty:ty $body:block
    ) => {
        pub async fn $fn_name($($arg: $arg_ty),*) -> $ret_ty {
            match $crate::get_cache() {
                Some(cache) => {
                    let cache_key = {
                        $(let $key_arg: $key_ty = &$arg;)*
                        format!("{}:{}", $cache_name, $key_expr)
                    };
                    $crate::cached_fn!(@read_through cache, cache_key, ($($ttl)?), $ret_ty, $body)
                }
                None => (|| async $body)().await,
            }
        }
    };

    // Shared read-through body: try the cache, fall back to the function,
    // write back on success.
    (@read_through $cache:ident, $cache_key:ident, ($($ttl:expr)?), $ret_ty:ty, $body:block) => {{
        if let Some(cached_bytes) = $cache.get($cache_key.as_str()).await {
            if let Ok(cached_value) = serde_json::from_slice(&cached_bytes) {
                return Ok(cached_value);
            }
        }

        let result: $ret_ty = (|| async $body)().await;

        if let Ok(ref value) = result {
            if let Ok(bytes) = serde_json::to_vec(value) {
                let ttl = $crate::cached_fn!(@ttl $($ttl)?);
                let _ = $cache.set($cache_key.as_str(), bytes, ttl).await;
            }
        }

        result
    }};

    (@ttl) => { $crate::Ttl::Default };
    (@ttl $ttl:expr) => { $crate::Ttl::Seconds($ttl) };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::{Backend, CacheConfig};
    use crate::manager::Cache;

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    cached_fn! {
        name = "double",
        ttl = 60,
        key = |n: &i64| n.to_string(),
        async fn double(cache: &Cache, n: i64) -> Result<i64, String> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(n * 2)
        }
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = Cache::new(CacheConfig {
            enabled: true,
            backend: Backend::Memory,
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(double(&cache, 21).await, Ok(42));
        assert_eq!(double(&cache, 21).await, Ok(42));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);

        // A different key computes again.
        assert_eq!(double(&cache, 2).await, Ok(4));
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }
}
