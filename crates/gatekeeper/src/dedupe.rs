//! Dedupe guard — Redis-backed duplicate suppression.
//!
//! Existence of a key within its TTL window is the sole proof that a send
//! was already attempted for that logical event. Concurrent workers racing
//! on the same key get exactly one winner.
//!
//! Uses Redis `SET NX EX` for atomic check-and-set with automatic TTL expiry.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use pulse_common::error::AppError;

/// Redis-backed dedupe guard.
pub struct DedupeGuard;

impl DedupeGuard {
    /// Atomically claim a dedupe key, with the category's dedupe window as TTL.
    ///
    /// Returns `true` if the key was claimed (first send — proceed).
    /// Returns `false` if the key already exists (duplicate — suppress).
    ///
    /// Keys are namespaced per user, so a logical key shared across
    /// recipients (e.g. a slip id seen by both participants) never collapses
    /// one user's send into another's.
    ///
    /// Uses Redis `SET key value NX EX ttl` for atomic check-and-set:
    /// - NX = only set if key doesn't exist
    /// - EX = set TTL in seconds
    pub async fn check_and_set(
        redis: &mut ConnectionManager,
        user_id: Uuid,
        dedupe_key: &str,
        ttl_secs: u64,
    ) -> Result<bool, AppError> {
        let key = Self::cache_key(user_id, dedupe_key);

        // Returns Some("OK") if the key was set (first send)
        // Returns None if the key already exists (duplicate)
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(redis)
            .await?;

        let claimed = result.is_some();

        if !claimed {
            tracing::debug!(
                user_id = %user_id,
                dedupe_key,
                ttl_secs,
                "Send suppressed — duplicate within dedupe window"
            );
        }

        Ok(claimed)
    }

    /// Release a dedupe key (operational escape hatch; not used by the
    /// send pipeline).
    pub async fn clear(
        redis: &mut ConnectionManager,
        user_id: Uuid,
        dedupe_key: &str,
    ) -> Result<(), AppError> {
        let key = Self::cache_key(user_id, dedupe_key);
        redis.del::<_, ()>(&key).await?;
        Ok(())
    }

    fn cache_key(user_id: Uuid, dedupe_key: &str) -> String {
        format!("dedupe:{}:{}", user_id, dedupe_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_user_namespaced() {
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        // Same logical key, different users → different cache keys
        assert_ne!(
            DedupeGuard::cache_key(user_a, "slip-expiring:42"),
            DedupeGuard::cache_key(user_b, "slip-expiring:42")
        );
        assert_eq!(
            DedupeGuard::cache_key(user_a, "slip-expiring:42"),
            format!("dedupe:{}:slip-expiring:42", user_a)
        );
    }
}
