//! Weekly recap — a week-in-review on the user's chosen local weekday.
//!
//! Gated like the digest (local hour match) plus a local ISO-weekday match
//! against the user's configured recap day. The dedupe key is ISO-week
//! scoped, not date scoped: a local day straddling a UTC cron boundary must
//! not yield two recaps.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::timeutil;
use pulse_common::types::{Category, NotificationPreference, ProcessorReport, SendRequest};

use crate::context::SchedulerContext;

const CANDIDATE_LIMIT: i64 = 5000;

#[derive(Debug, sqlx::FromRow)]
struct WeekStats {
    wins: i64,
    total: i64,
}

pub struct WeeklyRecapProcessor;

impl WeeklyRecapProcessor {
    pub async fn run(ctx: &mut SchedulerContext) -> ProcessorReport {
        let candidates = match Self::candidates(&ctx.pool).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Weekly recap candidate query failed");
                return ProcessorReport::failed(format!("candidate query failed: {e}"));
            }
        };

        let now = Utc::now();
        let default_tz = timeutil::resolve_timezone(&ctx.config.default_timezone, chrono_tz::UTC);

        let mut processed = 0u32;
        let mut skipped = 0u32;

        for prefs in &candidates {
            let tz = timeutil::resolve_timezone(&prefs.timezone, default_tz);
            if timeutil::local_weekday(tz, now) != prefs.recap_weekday as u32 {
                continue;
            }
            if !timeutil::local_hour_matches(tz, &prefs.digest_local_time, now) {
                continue;
            }

            let stats = match Self::week_stats(&ctx.pool, prefs.user_id).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(user_id = %prefs.user_id, error = %e, "Recap stats failed");
                    skipped += 1;
                    continue;
                }
            };
            if stats.total == 0 {
                skipped += 1;
                continue;
            }

            let week_key = timeutil::iso_week_key(tz, now);
            let request = SendRequest {
                user_id: prefs.user_id,
                category: Category::WeeklyRecap,
                template_id: "weekly_recap".to_string(),
                variables: serde_json::json!({
                    "wins": stats.wins,
                    "total": stats.total,
                    "week": week_key,
                }),
                entity_id: None,
                dedupe_key: format!("weekly-recap:{}:{}", prefs.user_id, week_key),
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
            format!("{} recap-enabled users scanned", candidates.len()),
        )
    }

    async fn candidates(pool: &PgPool) -> Result<Vec<NotificationPreference>, AppError> {
        let rows: Vec<NotificationPreference> = sqlx::query_as(
            r#"
            SELECT user_id, master_enabled, settlement_results, challenge_updates,
                   slip_expiring, win_streak, game_reminders, leaderboard_proximity,
                   daily_digest, weekly_recap, inactivity_nudge,
                   quiet_start, quiet_end, timezone, digest_local_time, recap_weekday
            FROM notification_preferences
            WHERE master_enabled = true AND weekly_recap = true
            LIMIT $1
            "#,
        )
        .bind(CANDIDATE_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Settled picks over the trailing seven days.
    async fn week_stats(pool: &PgPool, user_id: Uuid) -> Result<WeekStats, AppError> {
        let stats: WeekStats = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE outcome = 'won') AS wins,
                   COUNT(*) AS total
            FROM picks
            WHERE user_id = $1
              AND settled_at >= now() - interval '7 days'
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(stats)
    }
}
