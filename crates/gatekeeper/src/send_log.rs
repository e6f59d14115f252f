//! Send log — the persisted record of every gatekeeper decision that
//! produced (or failed to produce) a dispatch.
//!
//! Rows are append-only except for receipt reconciliation, which owns the
//! single SENT → {DELIVERED, FAILED} transition per row. One row is written
//! per dispatched device token so token-level receipt handling can target
//! the exact dead device.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{SendLogEntry, SendRequest, SendStatus};

pub struct SendLogStore;

impl SendLogStore {
    /// Record a successful enqueue: one row per token, carrying the ticket.
    pub async fn insert_sent(
        pool: &PgPool,
        request: &SendRequest,
        device_token: &str,
        ticket_id: &str,
    ) -> Result<Uuid, AppError> {
        Self::insert(
            pool,
            request,
            SendStatus::Sent,
            Some(ticket_id),
            Some(device_token),
            None,
            None,
        )
        .await
    }

    /// Record a dispatch that never reached the gateway (no tokens, or the
    /// gateway rejected this token's message outright).
    pub async fn insert_failed(
        pool: &PgPool,
        request: &SendRequest,
        device_token: Option<&str>,
        reason: &str,
    ) -> Result<Uuid, AppError> {
        Self::insert(
            pool,
            request,
            SendStatus::Failed,
            None,
            device_token,
            Some(reason),
            None,
        )
        .await
    }

    /// Record a quiet-hours suppression, giving a future deferred-redelivery
    /// pass a durable candidate set. `redeliver_after` is the instant the
    /// user's quiet window reopens.
    pub async fn insert_suppressed(
        pool: &PgPool,
        request: &SendRequest,
        redeliver_after: Option<DateTime<Utc>>,
    ) -> Result<Uuid, AppError> {
        Self::insert(
            pool,
            request,
            SendStatus::Suppressed,
            None,
            None,
            None,
            redeliver_after,
        )
        .await
    }

    async fn insert(
        pool: &PgPool,
        request: &SendRequest,
        status: SendStatus,
        ticket_id: Option<&str>,
        device_token: Option<&str>,
        receipt_status: Option<&str>,
        redeliver_after: Option<DateTime<Utc>>,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO notification_send_log
                (id, user_id, category, dedupe_key, status, gateway_ticket_id,
                 device_token, receipt_status, redeliver_after, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(request.user_id)
        .bind(request.category)
        .bind(&request.dedupe_key)
        .bind(status)
        .bind(ticket_id)
        .bind(device_token)
        .bind(receipt_status)
        .bind(redeliver_after)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(id)
    }

    /// SENT rows still awaiting a delivery receipt inside the lookback
    /// window, oldest first, bounded. Rows younger than `min_age_mins` are
    /// skipped — the gateway needs time to resolve its tickets.
    pub async fn list_awaiting_receipts(
        pool: &PgPool,
        lookback_hours: i64,
        min_age_mins: i64,
        limit: i64,
    ) -> Result<Vec<SendLogEntry>, AppError> {
        let now = Utc::now();
        let newest = now - Duration::minutes(min_age_mins);
        let oldest = now - Duration::hours(lookback_hours);

        let entries: Vec<SendLogEntry> = sqlx::query_as(
            r#"
            SELECT id, user_id, category, dedupe_key, status, gateway_ticket_id,
                   device_token, receipt_status, created_at
            FROM notification_send_log
            WHERE status = 'sent'
              AND receipt_status IS NULL
              AND gateway_ticket_id IS NOT NULL
              AND created_at >= $1
              AND created_at <= $2
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(oldest)
        .bind(newest)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }
}
