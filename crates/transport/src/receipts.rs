//! Receipt reconciliation — the second phase of the ticket/receipt model.
//!
//! For each ticket: a successful receipt marks the log row `DELIVERED`; a
//! permanent failure marks it `FAILED` and, for the "device not registered"
//! reason, deactivates the device token that produced it. Each ticket is
//! resolved at most once: the updates are guarded by `status = 'sent'`, and
//! this module is the only writer of receipt state.

use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::SendLogEntry;

use crate::gateway::PushGatewayClient;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReceiptSummary {
    pub checked: u32,
    pub delivered: u32,
    pub failed: u32,
    pub deactivated_tokens: u32,
}

/// Poll the gateway for the given log rows' tickets and apply the results.
///
/// Rows whose receipt is not yet available are left untouched for the next
/// pass. A failure applying one row is logged and does not abort the rest.
pub async fn reconcile_receipts(
    client: &PushGatewayClient,
    pool: &PgPool,
    entries: &[SendLogEntry],
) -> Result<ReceiptSummary, AppError> {
    let ticket_ids: Vec<String> = entries
        .iter()
        .filter_map(|e| e.gateway_ticket_id.clone())
        .collect();

    let mut summary = ReceiptSummary::default();
    if ticket_ids.is_empty() {
        return Ok(summary);
    }

    let receipts = client.fetch_receipts(&ticket_ids).await?;

    for entry in entries {
        let Some(ticket_id) = entry.gateway_ticket_id.as_deref() else {
            continue;
        };
        let Some(receipt) = receipts.get(ticket_id) else {
            // Not resolved by the gateway yet; polled again next run
            continue;
        };
        summary.checked += 1;

        let applied = if receipt.is_ok() {
            mark_delivered(pool, ticket_id).await
        } else {
            mark_failed(pool, ticket_id, &receipt.error_reason()).await
        };

        match applied {
            Ok(()) => {
                if receipt.is_ok() {
                    summary.delivered += 1;
                } else {
                    summary.failed += 1;
                    if receipt.is_device_not_registered() {
                        summary.deactivated_tokens +=
                            deactivate_dead_token(pool, entry).await.unwrap_or_else(|e| {
                                tracing::error!(
                                    ticket_id,
                                    error = %e,
                                    "Failed to deactivate dead token"
                                );
                                0
                            });
                    }
                }
            }
            Err(e) => {
                tracing::error!(ticket_id, error = %e, "Failed to apply receipt");
            }
        }
    }

    if summary.failed > 0 || summary.deactivated_tokens > 0 {
        tracing::info!(
            checked = summary.checked,
            delivered = summary.delivered,
            failed = summary.failed,
            deactivated_tokens = summary.deactivated_tokens,
            "Receipt reconciliation pass complete"
        );
    }

    Ok(summary)
}

async fn mark_delivered(pool: &PgPool, ticket_id: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE notification_send_log
        SET status = 'delivered', receipt_status = 'ok'
        WHERE gateway_ticket_id = $1 AND status = 'sent'
        "#,
    )
    .bind(ticket_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn mark_failed(pool: &PgPool, ticket_id: &str, reason: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE notification_send_log
        SET status = 'failed', receipt_status = $2
        WHERE gateway_ticket_id = $1 AND status = 'sent'
        "#,
    )
    .bind(ticket_id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(())
}

/// Deactivate the exact token the failed row was sent to. Rows that predate
/// token-level tracking have no token; for those, all of the user's tokens
/// are deactivated.
async fn deactivate_dead_token(pool: &PgPool, entry: &SendLogEntry) -> Result<u32, AppError> {
    let result = match entry.device_token.as_deref() {
        Some(token) => deactivate_token(pool, token).await?,
        None => deactivate_all_for_user(pool, entry.user_id).await?,
    };

    if result > 0 {
        tracing::info!(
            user_id = %entry.user_id,
            deactivated = result,
            "Deactivated unreachable device token(s)"
        );
    }
    Ok(result)
}

async fn deactivate_token(pool: &PgPool, token: &str) -> Result<u32, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE device_tokens
        SET is_active = false, deactivated_at = now()
        WHERE token = $1 AND is_active = true
        "#,
    )
    .bind(token)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() as u32)
}

async fn deactivate_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u32, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE device_tokens
        SET is_active = false, deactivated_at = now()
        WHERE user_id = $1 AND is_active = true
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() as u32)
}
