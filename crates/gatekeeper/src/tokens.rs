//! Device-token reads for dispatch.
//!
//! Tokens are registered by the device collaborator; the core reads active
//! ones at dispatch time (most-recently-used first) and only ever mutates
//! them through receipt reconciliation's deactivation path.

use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::DeviceToken;

/// Upper bound on tokens dispatched per send; a user with more devices than
/// this gets their stalest tokens skipped.
const MAX_TOKENS_PER_USER: i64 = 10;

pub struct DeviceTokenStore;

impl DeviceTokenStore {
    /// Active tokens for a user, most recently used first.
    pub async fn active_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<DeviceToken>, AppError> {
        let tokens: Vec<DeviceToken> = sqlx::query_as(
            r#"
            SELECT id, user_id, token, is_active, last_used_at, deactivated_at
            FROM device_tokens
            WHERE user_id = $1 AND is_active = true
            ORDER BY last_used_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(MAX_TOKENS_PER_USER)
        .fetch_all(pool)
        .await?;

        Ok(tokens)
    }
}
