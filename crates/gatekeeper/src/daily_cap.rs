//! Daily cap — bounds per-user notification volume per local calendar day.
//!
//! The counter is keyed by (user, local date) and expires at the user's
//! local end-of-day. `INCR` and `DECR` are single atomic Redis commands, so
//! concurrent workers cannot both observe a free slot. HIGH-urgency
//! categories never consult the cap; the gatekeeper skips this stage for
//! them entirely.

use redis::aio::ConnectionManager;
use uuid::Uuid;

use pulse_common::error::AppError;

/// Redis-backed daily send counter.
pub struct DailyCap;

impl DailyCap {
    /// Atomically claim one slot of the user's daily budget.
    ///
    /// Returns `true` if the post-increment count is within `max`. When the
    /// increment overshoots, the slot is handed back with `DECR` and `false`
    /// is returned.
    ///
    /// The TTL is attached on the first increment of the day so the counter
    /// dies at local midnight. A crash between `INCR` and `EXPIRE` can only
    /// leave a counter that outlives its day — never a duplicate send.
    pub async fn try_increment(
        redis: &mut ConnectionManager,
        user_id: Uuid,
        local_date: &str,
        max: u32,
        ttl_secs: u64,
    ) -> Result<bool, AppError> {
        let key = Self::cache_key(user_id, local_date);

        let count: i64 = redis::cmd("INCR").arg(&key).query_async(redis).await?;

        if count == 1 {
            let _: i64 = redis::cmd("EXPIRE")
                .arg(&key)
                .arg(ttl_secs)
                .query_async(redis)
                .await?;
        }

        if count > i64::from(max) {
            let _: i64 = redis::cmd("DECR").arg(&key).query_async(redis).await?;
            tracing::debug!(
                user_id = %user_id,
                local_date,
                max,
                "Send suppressed — daily cap reached"
            );
            return Ok(false);
        }

        Ok(true)
    }

    fn cache_key(user_id: Uuid, local_date: &str) -> String {
        format!("daily-cap:{}:{}", user_id, local_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_buckets_by_local_date() {
        let user = Uuid::new_v4();
        // Same user, adjacent local dates → independent counters
        assert_ne!(
            DailyCap::cache_key(user, "2025-01-14"),
            DailyCap::cache_key(user, "2025-01-15")
        );
        assert_eq!(
            DailyCap::cache_key(user, "2025-01-15"),
            format!("daily-cap:{}:2025-01-15", user)
        );
    }
}
