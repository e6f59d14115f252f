//! Slip expiring — last-call notices for two-sided matches about to lock.
//!
//! Candidates are active matches whose earliest attached event starts within
//! the threshold. Both participants are notified; they carry the same
//! slip-scoped dedupe key, which the gatekeeper's per-user cache namespacing
//! keeps from collapsing one side into the other.

use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{Category, ProcessorReport, SendRequest};

use crate::context::SchedulerContext;

/// Minutes before the earliest event at which the slip counts as expiring.
const EXPIRY_THRESHOLD_MINS: i32 = 20;

const CANDIDATE_LIMIT: i64 = 500;

#[derive(Debug, sqlx::FromRow)]
struct ExpiringSlip {
    slip_id: Uuid,
    creator_id: Uuid,
    opponent_id: Uuid,
    starts_in_mins: i32,
}

pub struct SlipExpiringProcessor;

impl SlipExpiringProcessor {
    pub async fn run(ctx: &mut SchedulerContext) -> ProcessorReport {
        let slips = match Self::candidates(&ctx.pool).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Slip expiring candidate query failed");
                return ProcessorReport::failed(format!("candidate query failed: {e}"));
            }
        };

        let mut processed = 0u32;
        let mut skipped = 0u32;

        for slip in &slips {
            for user_id in [slip.creator_id, slip.opponent_id] {
                let request = SendRequest {
                    user_id,
                    category: Category::SlipExpiring,
                    template_id: "slip_expiring".to_string(),
                    variables: serde_json::json!({
                        "slip_id": slip.slip_id,
                        "minutes_left": slip.starts_in_mins,
                    }),
                    entity_id: Some(slip.slip_id.to_string()),
                    // Slip-scoped; the dedupe guard's user namespacing keeps
                    // the two participants independent
                    dedupe_key: format!("slip-expiring:{}", slip.slip_id),
                };

                if ctx.gatekeeper.send(&mut ctx.redis, &request).await.is_accepted() {
                    processed += 1;
                } else {
                    skipped += 1;
                }
            }
        }

        ProcessorReport::ok(processed, skipped, format!("{} expiring slips", slips.len()))
    }

    /// Active matches whose first event starts within the threshold.
    async fn candidates(pool: &PgPool) -> Result<Vec<ExpiringSlip>, AppError> {
        let rows: Vec<ExpiringSlip> = sqlx::query_as(
            r#"
            SELECT m.id AS slip_id,
                   m.creator_id,
                   m.opponent_id,
                   CAST(EXTRACT(EPOCH FROM MIN(e.starts_at) - now()) / 60 AS INT) AS starts_in_mins
            FROM matches m
            JOIN picks p ON p.match_id = m.id
            JOIN scheduled_events e ON e.id = p.event_id
            WHERE m.status = 'active'
            GROUP BY m.id, m.creator_id, m.opponent_id
            HAVING MIN(e.starts_at) > now()
               AND MIN(e.starts_at) <= now() + make_interval(mins => $1)
            LIMIT $2
            "#,
        )
        .bind(EXPIRY_THRESHOLD_MINS)
        .bind(CANDIDATE_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
