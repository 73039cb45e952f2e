/// Cache-aside lookup for optional values.
///
/// Reads `$key` from `$cache`; on a miss runs `$block` (a future yielding
/// `AppResult<Option<T>>`) and queues a write-back of any `Some` value with a
/// TTL of `$ttl` seconds. A failed cache read is logged and treated as a miss,
/// so the backing store stays the source of truth.
///
/// # Example
/// ```rust,ignore
/// let profile: Option<UserProfile> = cached!(
///     cache,
///     CacheKey::UserProfile(user_id.to_string()),
///     ttl,
///     store.get_profile(user_id)
/// )?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await {
            Ok(Some(cached)) => Ok(Some(cached)),
            outcome => {
                if let Err(e) = outcome {
                    tracing::warn!(key = %key, error = %e, "Cache read failed, using backing store");
                }
                match $block.await {
                    Ok(Some(value)) => {
                        $cache.set_in_background(&key, &value, $ttl);
                        Ok(Some(value))
                    }
                    other => other,
                }
            }
        }
    }};
}
