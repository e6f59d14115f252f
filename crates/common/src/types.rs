use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification categories.
///
/// Each category carries an immutable delivery policy in the registry
/// (`Category::config()`). Scheduler processors cover the timer-driven
/// categories; `SettlementResult` and `ChallengeUpdate` are fired by the
/// settlement and matchmaking subsystems calling the gatekeeper directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum Category {
    SettlementResult,
    ChallengeUpdate,
    SlipExpiring,
    WinStreak,
    GameReminder,
    LeaderboardProximity,
    DailyDigest,
    WeeklyRecap,
    InactivityNudge,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::SettlementResult => write!(f, "settlement_result"),
            Category::ChallengeUpdate => write!(f, "challenge_update"),
            Category::SlipExpiring => write!(f, "slip_expiring"),
            Category::WinStreak => write!(f, "win_streak"),
            Category::GameReminder => write!(f, "game_reminder"),
            Category::LeaderboardProximity => write!(f, "leaderboard_proximity"),
            Category::DailyDigest => write!(f, "daily_digest"),
            Category::WeeklyRecap => write!(f, "weekly_recap"),
            Category::InactivityNudge => write!(f, "inactivity_nudge"),
        }
    }
}

/// Delivery urgency. HIGH categories bypass quiet hours and the daily cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    High,
    Medium,
    Low,
}

/// Send-log row status.
///
/// `Sent` transitions to `Delivered` or `Failed` exactly once, and only the
/// receipt-reconciliation processor performs that transition. `Suppressed`
/// rows record quiet-hour drops for a future deferred-redelivery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Delivered,
    Failed,
    Suppressed,
}

impl std::fmt::Display for SendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Delivered => write!(f, "delivered"),
            SendStatus::Failed => write!(f, "failed"),
            SendStatus::Suppressed => write!(f, "suppressed"),
        }
    }
}

/// Outcome of a gatekeeper send attempt.
///
/// Every variant is an expected result, not an error — callers treat any
/// non-`Accepted` outcome as a no-op and never retry within the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted,
    SuppressedMasterOff,
    SuppressedCategoryOff,
    SuppressedDuplicate,
    SuppressedQuietHours,
    SuppressedDailyCap,
    Failed,
}

impl SendOutcome {
    pub fn is_accepted(self) -> bool {
        self == SendOutcome::Accepted
    }
}

/// A candidate notification, built by a processor and judged by the gatekeeper.
///
/// `dedupe_key` is caller-supplied and must encode exactly the granularity at
/// which duplicates are suppressed (e.g. `slip-expiring:{slip_id}`,
/// `win-streak:{user_id}:{streak}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub user_id: Uuid,
    pub category: Category,
    pub template_id: String,
    pub variables: serde_json::Value,
    pub entity_id: Option<String>,
    pub dedupe_key: String,
}

/// Persisted record of a send decision, one row per dispatched device token.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SendLogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: Category,
    pub dedupe_key: String,
    pub status: SendStatus,
    pub gateway_ticket_id: Option<String>,
    pub device_token: Option<String>,
    pub receipt_status: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A registered push token for one of a user's devices.
///
/// Owned by the device-registration collaborator; this core only flips
/// `is_active` off when the gateway reports the device unreachable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub is_active: bool,
    pub last_used_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// Per-user notification preferences, owned by the user-settings collaborator.
///
/// Quiet hours and digest times are local "HH:mm" strings interpreted in the
/// user's IANA `timezone`. `recap_weekday` is ISO (1 = Monday).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationPreference {
    pub user_id: Uuid,
    pub master_enabled: bool,
    pub settlement_results: bool,
    pub challenge_updates: bool,
    pub slip_expiring: bool,
    pub win_streak: bool,
    pub game_reminders: bool,
    pub leaderboard_proximity: bool,
    pub daily_digest: bool,
    pub weekly_recap: bool,
    pub inactivity_nudge: bool,
    pub quiet_start: String,
    pub quiet_end: String,
    pub timezone: String,
    pub digest_local_time: String,
    pub recap_weekday: i16,
}

impl NotificationPreference {
    /// Resolve a category toggle by its registry `preference_field`.
    ///
    /// Unknown fields default to enabled — a registry/preferences drift must
    /// not silently mute a category.
    pub fn category_enabled(&self, field: &str) -> bool {
        match field {
            "settlement_results" => self.settlement_results,
            "challenge_updates" => self.challenge_updates,
            "slip_expiring" => self.slip_expiring,
            "win_streak" => self.win_streak,
            "game_reminders" => self.game_reminders,
            "leaderboard_proximity" => self.leaderboard_proximity,
            "daily_digest" => self.daily_digest,
            "weekly_recap" => self.weekly_recap,
            "inactivity_nudge" => self.inactivity_nudge,
            _ => true,
        }
    }

    /// Defaults for users without a stored preference row: everything on,
    /// no quiet hours, configured fallback timezone.
    pub fn defaults(user_id: Uuid, timezone: &str) -> Self {
        Self {
            user_id,
            master_enabled: true,
            settlement_results: true,
            challenge_updates: true,
            slip_expiring: true,
            win_streak: true,
            game_reminders: true,
            leaderboard_proximity: true,
            daily_digest: true,
            weekly_recap: true,
            inactivity_nudge: true,
            quiet_start: "00:00".to_string(),
            quiet_end: "00:00".to_string(),
            timezone: timezone.to_string(),
            digest_local_time: "18:00".to_string(),
            recap_weekday: 7,
        }
    }
}

/// Summary returned by every scheduler processor run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorReport {
    pub success: bool,
    pub processed: u32,
    pub skipped: u32,
    pub message: String,
}

impl ProcessorReport {
    pub fn ok(processed: u32, skipped: u32, message: impl Into<String>) -> Self {
        Self {
            success: true,
            processed,
            skipped,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            processed: 0,
            skipped: 0,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display_snake_case() {
        assert_eq!(Category::SlipExpiring.to_string(), "slip_expiring");
        assert_eq!(Category::DailyDigest.to_string(), "daily_digest");
        assert_eq!(
            Category::LeaderboardProximity.to_string(),
            "leaderboard_proximity"
        );
    }

    #[test]
    fn test_default_preferences_all_enabled() {
        let prefs = NotificationPreference::defaults(Uuid::new_v4(), "UTC");
        assert!(prefs.master_enabled);
        assert!(prefs.category_enabled("settlement_results"));
        assert!(prefs.category_enabled("inactivity_nudge"));
        // Disabled quiet hours encode as equal start/end
        assert_eq!(prefs.quiet_start, prefs.quiet_end);
    }

    #[test]
    fn test_unknown_preference_field_defaults_enabled() {
        let prefs = NotificationPreference::defaults(Uuid::new_v4(), "UTC");
        assert!(prefs.category_enabled("not_a_real_field"));
    }

    #[test]
    fn test_category_toggle_resolution() {
        let mut prefs = NotificationPreference::defaults(Uuid::new_v4(), "UTC");
        prefs.daily_digest = false;
        assert!(!prefs.category_enabled("daily_digest"));
        assert!(prefs.category_enabled("weekly_recap"));
    }
}
