//! Game reminders — nudge users with active picks on games starting soon.
//!
//! Candidates are scheduled events starting 60–120 minutes out with at least
//! one active pick. Recipients are the distinct users across the event's
//! picks, so a multi-pick user gets one notice per game, not one per pick.

use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{Category, ProcessorReport, SendRequest};

use crate::context::SchedulerContext;

/// Reminder window bounds, minutes before kickoff.
const WINDOW_MIN_MINS: i32 = 60;
const WINDOW_MAX_MINS: i32 = 120;

const CANDIDATE_LIMIT: i64 = 2000;

#[derive(Debug, sqlx::FromRow)]
struct ReminderCandidate {
    event_id: Uuid,
    event_label: String,
    starts_in_mins: i32,
    user_id: Uuid,
}

pub struct GameReminderProcessor;

impl GameReminderProcessor {
    pub async fn run(ctx: &mut SchedulerContext) -> ProcessorReport {
        let candidates = match Self::candidates(&ctx.pool).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Game reminder candidate query failed");
                return ProcessorReport::failed(format!("candidate query failed: {e}"));
            }
        };

        let mut processed = 0u32;
        let mut skipped = 0u32;

        for candidate in &candidates {
            let request = SendRequest {
                user_id: candidate.user_id,
                category: Category::GameReminder,
                template_id: "game_reminder".to_string(),
                variables: serde_json::json!({
                    "event_label": candidate.event_label,
                    "starts_in_mins": candidate.starts_in_mins,
                }),
                entity_id: Some(candidate.event_id.to_string()),
                dedupe_key: format!(
                    "game-reminder:{}:{}",
                    candidate.user_id, candidate.event_id
                ),
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
            format!("{} reminder candidates", candidates.len()),
        )
    }

    /// Distinct (event, user) pairs for events in the reminder window.
    async fn candidates(pool: &PgPool) -> Result<Vec<ReminderCandidate>, AppError> {
        let rows: Vec<ReminderCandidate> = sqlx::query_as(
            r#"
            SELECT e.id AS event_id,
                   e.label AS event_label,
                   CAST(EXTRACT(EPOCH FROM e.starts_at - now()) / 60 AS INT) AS starts_in_mins,
                   p.user_id
            FROM scheduled_events e
            JOIN picks p ON p.event_id = e.id AND p.status = 'active'
            WHERE e.starts_at >= now() + make_interval(mins => $1)
              AND e.starts_at <  now() + make_interval(mins => $2)
            GROUP BY e.id, e.label, e.starts_at, p.user_id
            LIMIT $3
            "#,
        )
        .bind(WINDOW_MIN_MINS)
        .bind(WINDOW_MAX_MINS)
        .bind(CANDIDATE_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
