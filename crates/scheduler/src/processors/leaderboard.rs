//! Leaderboard proximity — alert users within striking distance of the
//! visible top of the active ranking period.
//!
//! Finds the score at the boundary rank, then the users ranked just below
//! it whose score is within the proximity window. The dedupe key is
//! (user, leaderboard) scoped, so the category's dedupe window caps this to
//! one alert per period per user.

use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{Category, ProcessorReport, SendRequest};

use crate::context::SchedulerContext;

/// Rank whose score defines the boundary (top-N cutoff).
const BOUNDARY_RANK: i32 = 10;

/// Maximum points behind the boundary score to qualify.
const PROXIMITY_POINTS: i64 = 25;

const CANDIDATE_LIMIT: i64 = 200;

#[derive(Debug, sqlx::FromRow)]
struct NearbyEntry {
    user_id: Uuid,
    score: i64,
    rank: i32,
}

pub struct LeaderboardProximityProcessor;

impl LeaderboardProximityProcessor {
    pub async fn run(ctx: &mut SchedulerContext) -> ProcessorReport {
        let Some(leaderboard_id) = (match Self::active_leaderboard(&ctx.pool).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "Active leaderboard query failed");
                return ProcessorReport::failed(format!("candidate query failed: {e}"));
            }
        }) else {
            return ProcessorReport::ok(0, 0, "no active leaderboard period");
        };

        let Some(boundary_score) =
            (match Self::boundary_score(&ctx.pool, leaderboard_id).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "Boundary score query failed");
                    return ProcessorReport::failed(format!("candidate query failed: {e}"));
                }
            })
        else {
            return ProcessorReport::ok(0, 0, "leaderboard has no boundary rank yet");
        };

        let nearby = match Self::nearby_entries(&ctx.pool, leaderboard_id, boundary_score).await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "Nearby entries query failed");
                return ProcessorReport::failed(format!("candidate query failed: {e}"));
            }
        };

        let mut processed = 0u32;
        let mut skipped = 0u32;

        for entry in &nearby {
            let request = SendRequest {
                user_id: entry.user_id,
                category: Category::LeaderboardProximity,
                template_id: "leaderboard_proximity".to_string(),
                variables: serde_json::json!({
                    "rank": entry.rank,
                    "points_behind": boundary_score - entry.score,
                    "boundary_rank": BOUNDARY_RANK,
                }),
                entity_id: None,
                dedupe_key: format!("leaderboard:{}:{}", entry.user_id, leaderboard_id),
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
            format!("{} users near the boundary", nearby.len()),
        )
    }

    async fn active_leaderboard(pool: &PgPool) -> Result<Option<Uuid>, AppError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM leaderboards WHERE status = 'active' ORDER BY starts_at DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn boundary_score(pool: &PgPool, leaderboard_id: Uuid) -> Result<Option<i64>, AppError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT score FROM leaderboard_entries WHERE leaderboard_id = $1 AND rank = $2",
        )
        .bind(leaderboard_id)
        .bind(BOUNDARY_RANK)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(score,)| score))
    }

    /// Users ranked strictly below the boundary, within the point window.
    async fn nearby_entries(
        pool: &PgPool,
        leaderboard_id: Uuid,
        boundary_score: i64,
    ) -> Result<Vec<NearbyEntry>, AppError> {
        let rows: Vec<NearbyEntry> = sqlx::query_as(
            r#"
            SELECT user_id, score, rank
            FROM leaderboard_entries
            WHERE leaderboard_id = $1
              AND rank > $2
              AND score >= $3
            ORDER BY rank ASC
            LIMIT $4
            "#,
        )
        .bind(leaderboard_id)
        .bind(BOUNDARY_RANK)
        .bind(boundary_score - PROXIMITY_POINTS)
        .bind(CANDIDATE_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
