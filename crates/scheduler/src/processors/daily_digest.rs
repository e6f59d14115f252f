//! Daily digest — a once-a-day summary at each user's preferred local hour.
//!
//! One hourly UTC tick covers every timezone: a user is a recipient only
//! when their computed local hour equals their configured digest hour. The
//! day's pick count is taken over the user's local calendar day, not UTC,
//! so users near the date line are never off by a day.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::timeutil;
use pulse_common::types::{Category, NotificationPreference, ProcessorReport, SendRequest};

use crate::context::SchedulerContext;

const CANDIDATE_LIMIT: i64 = 5000;

pub struct DailyDigestProcessor;

impl DailyDigestProcessor {
    pub async fn run(ctx: &mut SchedulerContext) -> ProcessorReport {
        let candidates = match Self::candidates(&ctx.pool).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Daily digest candidate query failed");
                return ProcessorReport::failed(format!("candidate query failed: {e}"));
            }
        };

        let now = Utc::now();
        let default_tz = timeutil::resolve_timezone(&ctx.config.default_timezone, chrono_tz::UTC);

        let mut processed = 0u32;
        let mut skipped = 0u32;

        for prefs in &candidates {
            let tz = timeutil::resolve_timezone(&prefs.timezone, default_tz);
            if !timeutil::local_hour_matches(tz, &prefs.digest_local_time, now) {
                continue;
            }

            let event_count = match Self::todays_pick_count(&ctx.pool, prefs.user_id, tz, now).await
            {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(user_id = %prefs.user_id, error = %e, "Digest count failed");
                    skipped += 1;
                    continue;
                }
            };
            if event_count == 0 {
                skipped += 1;
                continue;
            }

            let local_date = timeutil::local_date(tz, now);
            let request = SendRequest {
                user_id: prefs.user_id,
                category: Category::DailyDigest,
                template_id: "daily_digest".to_string(),
                variables: serde_json::json!({
                    "event_count": event_count,
                    "local_date": local_date,
                }),
                entity_id: None,
                dedupe_key: format!("daily-digest:{}:{}", prefs.user_id, local_date),
            };

            if ctx.gatekeeper.send(&mut ctx.redis, &request).await.is_accepted() {
                processed += 1;
            } else {
                skipped += 1;
            }
        }

        ProcessorReport::ok(
            processed,
            skipped,
            format!("{} digest-enabled users scanned", candidates.len()),
        )
    }

    /// Users with the digest enabled. Hour gating happens in memory — the
    /// quiet-hours/toggle decision still belongs to the gatekeeper.
    async fn candidates(pool: &PgPool) -> Result<Vec<NotificationPreference>, AppError> {
        let rows: Vec<NotificationPreference> = sqlx::query_as(
            r#"
            SELECT user_id, master_enabled, settlement_results, challenge_updates,
                   slip_expiring, win_streak, game_reminders, leaderboard_proximity,
                   daily_digest, weekly_recap, inactivity_nudge,
                   quiet_start, quiet_end, timezone, digest_local_time, recap_weekday
            FROM notification_preferences
            WHERE master_enabled = true AND daily_digest = true
            LIMIT $1
            "#,
        )
        .bind(CANDIDATE_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Picks on events starting within the user's local calendar day.
    async fn todays_pick_count(
        pool: &PgPool,
        user_id: Uuid,
        tz: chrono_tz::Tz,
        now: chrono::DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let (day_start, day_end) = timeutil::local_day_bounds(tz, now);

        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM picks p
            JOIN scheduled_events e ON e.id = p.event_id
            WHERE p.user_id = $1
              AND p.status = 'active'
              AND e.starts_at >= $2
              AND e.starts_at < $3
            "#,
        )
        .bind(user_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
