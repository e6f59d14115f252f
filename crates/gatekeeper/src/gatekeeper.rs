//! The gatekeeper — the single choke point every candidate notification
//! passes through before transport.
//!
//! Pipeline, each stage short-circuiting:
//! 1. Master switch
//! 2. Per-category toggle
//! 3. Atomic dedupe (`SET NX EX`, TTL = category dedupe window)
//! 4. Quiet hours (HIGH urgency exempt; suppression leaves a log row)
//! 5. Daily cap (HIGH urgency exempt; atomic increment, decrement on over)
//! 6. Dispatch: one message per active device token, SENT log row per ticket
//!
//! `send` never returns an error — every failure mode is a typed
//! [`SendOutcome`], and callers treat anything non-`Accepted` as a no-op.
//! Once stage 3 claims the dedupe key, a downstream dispatch failure does
//! not release it: duplicate-avoidance wins over delivery-completeness.

use chrono::Utc;
use chrono_tz::Tz;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use pulse_common::error::AppError;
use pulse_common::registry::CategoryConfig;
use pulse_common::timeutil;
use pulse_common::types::{DeviceToken, SendOutcome, SendRequest, Urgency};
use pulse_transport::{PushGatewayClient, PushMessage};

use crate::daily_cap::DailyCap;
use crate::dedupe::DedupeGuard;
use crate::preferences::PreferenceStore;
use crate::send_log::SendLogStore;
use crate::tokens::DeviceTokenStore;

/// Policy-enforcement chokepoint for all notification sends.
pub struct Gatekeeper {
    pool: PgPool,
    gateway: PushGatewayClient,
    daily_cap_max: u32,
    default_tz: Tz,
}

impl Gatekeeper {
    pub fn new(
        pool: PgPool,
        gateway: PushGatewayClient,
        daily_cap_max: u32,
        default_timezone: &str,
    ) -> Self {
        Self {
            pool,
            gateway,
            daily_cap_max,
            default_tz: timeutil::resolve_timezone(default_timezone, chrono_tz::UTC),
        }
    }

    /// Judge and, if accepted, dispatch one candidate notification.
    ///
    /// Infallible by contract: internal errors are logged and mapped to
    /// `SendOutcome::Failed`.
    pub async fn send(&self, redis: &mut ConnectionManager, request: &SendRequest) -> SendOutcome {
        match self.evaluate(redis, request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    user_id = %request.user_id,
                    category = %request.category,
                    dedupe_key = %request.dedupe_key,
                    error = %e,
                    "Gatekeeper send failed"
                );
                SendOutcome::Failed
            }
        }
    }

    async fn evaluate(
        &self,
        redis: &mut ConnectionManager,
        request: &SendRequest,
    ) -> Result<SendOutcome, AppError> {
        let config = request.category.config();

        let prefs =
            PreferenceStore::for_user(&self.pool, request.user_id, self.default_tz.name()).await?;

        // 1. Master switch
        if !prefs.master_enabled {
            return Ok(SendOutcome::SuppressedMasterOff);
        }

        // 2. Category toggle
        if !prefs.category_enabled(config.preference_field) {
            return Ok(SendOutcome::SuppressedCategoryOff);
        }

        // 3. Dedupe — atomic test-and-set; from here on the key is consumed
        if !DedupeGuard::check_and_set(
            redis,
            request.user_id,
            &request.dedupe_key,
            config.dedupe_window_secs,
        )
        .await?
        {
            return Ok(SendOutcome::SuppressedDuplicate);
        }

        let now = Utc::now();
        let tz = timeutil::resolve_timezone(&prefs.timezone, self.default_tz);

        // 4. Quiet hours — HIGH urgency is time-critical and never held back
        if config.urgency != Urgency::High
            && timeutil::is_quiet_hours(tz, &prefs.quiet_start, &prefs.quiet_end, now)
        {
            let redeliver_after = timeutil::next_local_time(tz, &prefs.quiet_end, now);
            SendLogStore::insert_suppressed(&self.pool, request, redeliver_after).await?;
            tracing::debug!(
                user_id = %request.user_id,
                category = %request.category,
                "Send suppressed — quiet hours"
            );
            return Ok(SendOutcome::SuppressedQuietHours);
        }

        // 5. Daily cap — HIGH urgency exempt
        if config.urgency != Urgency::High {
            let date = timeutil::local_date(tz, now);
            let ttl = timeutil::seconds_until_local_midnight(tz, now);
            if !DailyCap::try_increment(redis, request.user_id, &date, self.daily_cap_max, ttl)
                .await?
            {
                return Ok(SendOutcome::SuppressedDailyCap);
            }
        }

        // 6. Dispatch
        self.dispatch(request, config).await
    }

    async fn dispatch(
        &self,
        request: &SendRequest,
        config: &CategoryConfig,
    ) -> Result<SendOutcome, AppError> {
        let tokens = DeviceTokenStore::active_for_user(&self.pool, request.user_id).await?;
        if tokens.is_empty() {
            SendLogStore::insert_failed(&self.pool, request, None, "no active device tokens")
                .await?;
            tracing::warn!(
                user_id = %request.user_id,
                category = %request.category,
                "Send accepted but undeliverable — no active device tokens"
            );
            return Ok(SendOutcome::Failed);
        }

        let messages: Vec<PushMessage> = tokens
            .iter()
            .map(|t| build_message(t, request, config))
            .collect();

        let results = self.gateway.send_batch(&messages).await;

        let mut any_enqueued = false;
        for (token, result) in tokens.iter().zip(results) {
            match result.ticket_id {
                Some(ticket_id) => {
                    SendLogStore::insert_sent(&self.pool, request, &token.token, &ticket_id)
                        .await?;
                    any_enqueued = true;
                }
                None => {
                    let reason = result.error.as_deref().unwrap_or("gateway error");
                    SendLogStore::insert_failed(&self.pool, request, Some(&token.token), reason)
                        .await?;
                }
            }
        }

        if any_enqueued {
            tracing::info!(
                user_id = %request.user_id,
                category = %request.category,
                dedupe_key = %request.dedupe_key,
                tokens = tokens.len(),
                "Notification dispatched"
            );
            Ok(SendOutcome::Accepted)
        } else {
            Ok(SendOutcome::Failed)
        }
    }
}

/// Build the gateway message for one device.
///
/// Rendering is client-side (templates are opaque ids): the template id
/// rides in the title slot and the full payload travels in `data`.
fn build_message(token: &DeviceToken, request: &SendRequest, config: &CategoryConfig) -> PushMessage {
    PushMessage {
        to: token.token.clone(),
        title: request.template_id.clone(),
        body: String::new(),
        data: serde_json::json!({
            "templateId": request.template_id,
            "variables": request.variables,
            "deepLink": request.category.deep_link_for(request.entity_id.as_deref()),
            "category": request.category.to_string(),
        }),
        ttl: config.ttl_secs,
        channel_id: config.channel_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::types::Category;
    use uuid::Uuid;

    fn make_token(token: &str) -> DeviceToken {
        DeviceToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: token.to_string(),
            is_active: true,
            last_used_at: Utc::now(),
            deactivated_at: None,
        }
    }

    fn make_request(category: Category, entity_id: Option<&str>) -> SendRequest {
        SendRequest {
            user_id: Uuid::new_v4(),
            category,
            template_id: "slip_expiring_v1".to_string(),
            variables: serde_json::json!({"minutes_left": 18}),
            entity_id: entity_id.map(str::to_string),
            dedupe_key: "slip-expiring:slip-9".to_string(),
        }
    }

    #[test]
    fn test_build_message_carries_policy_and_payload() {
        let token = make_token("PulseToken[abc]");
        let request = make_request(Category::SlipExpiring, Some("slip-9"));
        let config = Category::SlipExpiring.config();

        let msg = build_message(&token, &request, config);

        assert_eq!(msg.to, "PulseToken[abc]");
        assert_eq!(msg.title, "slip_expiring_v1");
        assert_eq!(msg.ttl, config.ttl_secs);
        assert_eq!(msg.channel_id, "slips");
        assert_eq!(
            msg.data["deepLink"].as_str().unwrap(),
            "pickpulse://slips/slip-9"
        );
        assert_eq!(msg.data["category"].as_str().unwrap(), "slip_expiring");
        assert_eq!(msg.data["variables"]["minutes_left"], 18);
    }

    #[test]
    fn test_build_message_without_entity_drops_link_segment() {
        let token = make_token("PulseToken[def]");
        let request = make_request(Category::LeaderboardProximity, None);
        let config = Category::LeaderboardProximity.config();

        let msg = build_message(&token, &request, config);
        assert_eq!(
            msg.data["deepLink"].as_str().unwrap(),
            "pickpulse://leaderboard"
        );
    }
}
