//! Preference reads — the gatekeeper's view of the user-settings collaborator.
//!
//! The preference row is owned and mutated elsewhere; this core only reads
//! it. A user without a row gets defaults with everything enabled — a
//! brand-new user must still receive HIGH-urgency transactional notices.

use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::NotificationPreference;

/// Read-only access to per-user notification preferences.
pub struct PreferenceStore;

impl PreferenceStore {
    /// Fetch a user's preferences, substituting defaults when no row exists.
    pub async fn for_user(
        pool: &PgPool,
        user_id: Uuid,
        default_timezone: &str,
    ) -> Result<NotificationPreference, AppError> {
        let prefs: Option<NotificationPreference> = sqlx::query_as(
            r#"
            SELECT user_id, master_enabled, settlement_results, challenge_updates,
                   slip_expiring, win_streak, game_reminders, leaderboard_proximity,
                   daily_digest, weekly_recap, inactivity_nudge,
                   quiet_start, quiet_end, timezone, digest_local_time, recap_weekday
            FROM notification_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(prefs.unwrap_or_else(|| NotificationPreference::defaults(user_id, default_timezone)))
    }
}
