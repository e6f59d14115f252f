//! Win-streak milestones — fired ad hoc after a settlement event, not on a
//! timer.
//!
//! Fires only when the current streak exactly equals a milestone. The
//! milestone value itself is part of the dedupe key: a retried settlement
//! job for the same milestone is naturally suppressed, while a later,
//! higher milestone forms a fresh key and goes through.

use uuid::Uuid;

use pulse_common::types::{Category, ProcessorReport, SendRequest};

use crate::context::SchedulerContext;

/// Streak values that earn a notification.
pub const STREAK_MILESTONES: [u32; 3] = [3, 5, 10];

pub struct WinStreakProcessor;

impl WinStreakProcessor {
    pub fn is_milestone(streak: u32) -> bool {
        STREAK_MILESTONES.contains(&streak)
    }

    pub async fn run(
        ctx: &mut SchedulerContext,
        user_id: Uuid,
        current_streak: u32,
    ) -> ProcessorReport {
        if !Self::is_milestone(current_streak) {
            return Self::non_milestone_report(current_streak);
        }

        let request = SendRequest {
            user_id,
            category: Category::WinStreak,
            template_id: "win_streak".to_string(),
            variables: serde_json::json!({ "streak": current_streak }),
            entity_id: None,
            dedupe_key: format!("win-streak:{}:{}", user_id, current_streak),
        };

        if ctx.gatekeeper.send(&mut ctx.redis, &request).await.is_accepted() {
            ProcessorReport::ok(1, 0, format!("streak milestone {current_streak}"))
        } else {
            ProcessorReport::ok(0, 1, format!("streak milestone {current_streak} suppressed"))
        }
    }

    /// Report for a settlement whose streak is not a milestone: nothing
    /// processed, the one candidate counted as skipped.
    fn non_milestone_report(current_streak: u32) -> ProcessorReport {
        ProcessorReport::ok(0, 1, format!("streak {current_streak} is not a milestone"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestones_fire_exactly() {
        assert!(WinStreakProcessor::is_milestone(3));
        assert!(WinStreakProcessor::is_milestone(5));
        assert!(WinStreakProcessor::is_milestone(10));
    }

    #[test]
    fn test_between_milestones_do_not_fire() {
        for streak in [0, 1, 2, 4, 6, 7, 8, 9, 11, 42] {
            assert!(!WinStreakProcessor::is_milestone(streak), "streak {streak}");
        }
    }

    #[test]
    fn test_non_milestone_streak_counts_one_skipped() {
        // streak 4: nothing sent, the candidate shows up as skipped
        let report = WinStreakProcessor::non_milestone_report(4);
        assert!(report.success);
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_dedupe_key_encodes_milestone() {
        let user_id = Uuid::new_v4();
        let key = format!("win-streak:{}:{}", user_id, 5);
        assert!(key.contains(":5"));
        assert_ne!(key, format!("win-streak:{}:{}", user_id, 10));
    }
}
