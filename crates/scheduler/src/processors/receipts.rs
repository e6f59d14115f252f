//! Receipt reconciliation — resolve outstanding gateway tickets.
//!
//! Not a recipient fan-out job: it gathers recently-sent log rows still
//! awaiting a receipt, in bounded batches, and delegates to the transport's
//! receipt API, which performs the SENT → {DELIVERED, FAILED} transitions
//! and token deactivation.

use pulse_common::types::ProcessorReport;
use pulse_gatekeeper::send_log::SendLogStore;
use pulse_transport::reconcile_receipts;

use crate::context::SchedulerContext;

const BATCH_LIMIT: i64 = 300;

pub struct ReceiptProcessor;

impl ReceiptProcessor {
    pub async fn run(ctx: &mut SchedulerContext) -> ProcessorReport {
        let pending = match SendLogStore::list_awaiting_receipts(
            &ctx.pool,
            ctx.config.receipt_lookback_hours,
            ctx.config.receipt_min_age_mins,
            BATCH_LIMIT,
        )
        .await
        {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Receipt candidate query failed");
                return ProcessorReport::failed(format!("candidate query failed: {e}"));
            }
        };

        if pending.is_empty() {
            return ProcessorReport::ok(0, 0, "no tickets awaiting receipts");
        }

        match reconcile_receipts(&ctx.gateway, &ctx.pool, &pending).await {
            Ok(summary) => ProcessorReport::ok(
                summary.delivered,
                summary.failed,
                format!(
                    "{} checked, {} deactivated tokens",
                    summary.checked, summary.deactivated_tokens
                ),
            ),
            Err(e) => {
                tracing::error!(error = %e, "Receipt reconciliation failed");
                ProcessorReport::failed(format!("receipt endpoint failed: {e}"))
            }
        }
    }
}
