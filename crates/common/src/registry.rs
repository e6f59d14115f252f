//! Category registry — the fixed delivery policy for every notification
//! category.
//!
//! The registry is a compile-time table: `Category::config()` is a total
//! function with no error path. A missing entry is unrepresentable because
//! the match is exhaustive. Changes to cap priorities or dedupe windows are
//! deployment-time configuration changes, not runtime-mutable state.

use crate::types::{Category, Urgency};

/// Immutable delivery policy for one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryConfig {
    /// Delivery urgency. HIGH bypasses quiet hours and the daily cap.
    pub urgency: Urgency,
    /// Globally unique priority; lower = more important. Every HIGH value is
    /// lower than every MEDIUM value, every MEDIUM lower than every LOW.
    pub cap_priority: u32,
    /// TTL of the dedupe key set at accept-time, in seconds.
    pub dedupe_window_secs: u64,
    /// Push message TTL handed to the gateway, in seconds.
    pub ttl_secs: u64,
    /// Notification channel identifier, unique per category.
    pub channel_id: &'static str,
    /// Deep-link template; `{entity_id}` is substituted per send.
    pub deep_link: &'static str,
    /// Name of the per-user opt-out switch, unique per category.
    pub preference_field: &'static str,
}

const SETTLEMENT_RESULT: CategoryConfig = CategoryConfig {
    urgency: Urgency::High,
    cap_priority: 10,
    dedupe_window_secs: 6 * 3600,
    ttl_secs: 3600,
    channel_id: "settlements",
    deep_link: "pickpulse://slips/{entity_id}",
    preference_field: "settlement_results",
};

const CHALLENGE_UPDATE: CategoryConfig = CategoryConfig {
    urgency: Urgency::High,
    cap_priority: 20,
    dedupe_window_secs: 3600,
    ttl_secs: 3600,
    channel_id: "challenges",
    deep_link: "pickpulse://challenges/{entity_id}",
    preference_field: "challenge_updates",
};

const SLIP_EXPIRING: CategoryConfig = CategoryConfig {
    urgency: Urgency::High,
    cap_priority: 30,
    dedupe_window_secs: 24 * 3600,
    ttl_secs: 1800,
    channel_id: "slips",
    deep_link: "pickpulse://slips/{entity_id}",
    preference_field: "slip_expiring",
};

const WIN_STREAK: CategoryConfig = CategoryConfig {
    urgency: Urgency::Medium,
    cap_priority: 40,
    dedupe_window_secs: 7 * 24 * 3600,
    ttl_secs: 12 * 3600,
    channel_id: "milestones",
    deep_link: "pickpulse://profile/streak",
    preference_field: "win_streak",
};

const GAME_REMINDER: CategoryConfig = CategoryConfig {
    urgency: Urgency::Medium,
    cap_priority: 50,
    dedupe_window_secs: 24 * 3600,
    ttl_secs: 2 * 3600,
    channel_id: "reminders",
    deep_link: "pickpulse://games/{entity_id}",
    preference_field: "game_reminders",
};

const LEADERBOARD_PROXIMITY: CategoryConfig = CategoryConfig {
    urgency: Urgency::Medium,
    cap_priority: 60,
    dedupe_window_secs: 24 * 3600,
    ttl_secs: 12 * 3600,
    channel_id: "leaderboard",
    deep_link: "pickpulse://leaderboard",
    preference_field: "leaderboard_proximity",
};

const DAILY_DIGEST: CategoryConfig = CategoryConfig {
    urgency: Urgency::Low,
    cap_priority: 70,
    dedupe_window_secs: 20 * 3600,
    ttl_secs: 6 * 3600,
    channel_id: "digests",
    deep_link: "pickpulse://home",
    preference_field: "daily_digest",
};

const WEEKLY_RECAP: CategoryConfig = CategoryConfig {
    urgency: Urgency::Low,
    cap_priority: 80,
    dedupe_window_secs: 6 * 24 * 3600,
    ttl_secs: 24 * 3600,
    channel_id: "recaps",
    deep_link: "pickpulse://recap",
    preference_field: "weekly_recap",
};

const INACTIVITY_NUDGE: CategoryConfig = CategoryConfig {
    urgency: Urgency::Low,
    cap_priority: 90,
    dedupe_window_secs: 36 * 3600,
    ttl_secs: 24 * 3600,
    channel_id: "engagement",
    deep_link: "pickpulse://home",
    preference_field: "inactivity_nudge",
};

impl Category {
    /// All categories, for registry sweeps and invariant checks.
    pub const ALL: [Category; 9] = [
        Category::SettlementResult,
        Category::ChallengeUpdate,
        Category::SlipExpiring,
        Category::WinStreak,
        Category::GameReminder,
        Category::LeaderboardProximity,
        Category::DailyDigest,
        Category::WeeklyRecap,
        Category::InactivityNudge,
    ];

    /// Resolve this category's delivery policy. Total — every variant has
    /// exactly one entry.
    pub const fn config(self) -> &'static CategoryConfig {
        match self {
            Category::SettlementResult => &SETTLEMENT_RESULT,
            Category::ChallengeUpdate => &CHALLENGE_UPDATE,
            Category::SlipExpiring => &SLIP_EXPIRING,
            Category::WinStreak => &WIN_STREAK,
            Category::GameReminder => &GAME_REMINDER,
            Category::LeaderboardProximity => &LEADERBOARD_PROXIMITY,
            Category::DailyDigest => &DAILY_DIGEST,
            Category::WeeklyRecap => &WEEKLY_RECAP,
            Category::InactivityNudge => &INACTIVITY_NUDGE,
        }
    }

    /// Whether this category is exempt from the daily cap and quiet hours.
    pub fn is_cap_exempt(self) -> bool {
        self.config().urgency == Urgency::High
    }

    /// Render the deep link for a send, substituting the entity id.
    pub fn deep_link_for(self, entity_id: Option<&str>) -> String {
        let template = self.config().deep_link;
        match entity_id {
            Some(id) => template.replace("{entity_id}", id),
            None => template.replace("/{entity_id}", ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_cap_priorities_unique_and_positive() {
        let mut seen = HashSet::new();
        for cat in Category::ALL {
            let p = cat.config().cap_priority;
            assert!(p > 0, "{cat} priority must be positive");
            assert!(seen.insert(p), "{cat} priority {p} is duplicated");
        }
    }

    #[test]
    fn test_priority_bands_ordered_by_urgency() {
        let max_high = Category::ALL
            .iter()
            .filter(|c| c.config().urgency == Urgency::High)
            .map(|c| c.config().cap_priority)
            .max()
            .unwrap();
        let min_medium = Category::ALL
            .iter()
            .filter(|c| c.config().urgency == Urgency::Medium)
            .map(|c| c.config().cap_priority)
            .min()
            .unwrap();
        let max_medium = Category::ALL
            .iter()
            .filter(|c| c.config().urgency == Urgency::Medium)
            .map(|c| c.config().cap_priority)
            .max()
            .unwrap();
        let min_low = Category::ALL
            .iter()
            .filter(|c| c.config().urgency == Urgency::Low)
            .map(|c| c.config().cap_priority)
            .min()
            .unwrap();

        assert!(max_high < min_medium);
        assert!(max_medium < min_low);
    }

    #[test]
    fn test_channel_ids_unique() {
        let mut seen = HashSet::new();
        for cat in Category::ALL {
            assert!(
                seen.insert(cat.config().channel_id),
                "{cat} channel id is duplicated"
            );
        }
    }

    #[test]
    fn test_preference_fields_unique() {
        let mut seen = HashSet::new();
        for cat in Category::ALL {
            assert!(
                seen.insert(cat.config().preference_field),
                "{cat} preference field is duplicated"
            );
        }
    }

    #[test]
    fn test_only_high_urgency_is_cap_exempt() {
        for cat in Category::ALL {
            assert_eq!(cat.is_cap_exempt(), cat.config().urgency == Urgency::High);
        }
    }

    #[test]
    fn test_deep_link_substitution() {
        assert_eq!(
            Category::SlipExpiring.deep_link_for(Some("abc-123")),
            "pickpulse://slips/abc-123"
        );
        // No entity → the path segment is dropped, not left as a literal
        assert_eq!(
            Category::SlipExpiring.deep_link_for(None),
            "pickpulse://slips"
        );
        assert_eq!(
            Category::LeaderboardProximity.deep_link_for(None),
            "pickpulse://leaderboard"
        );
    }
}
