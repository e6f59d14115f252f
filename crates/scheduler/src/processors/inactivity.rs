//! Inactivity nudges — a two-tier win-back cascade.
//!
//! The 7-day cohort is processed first and recorded; the 48-hour cohort
//! then excludes anyone already notified in the same run, so a user past
//! both thresholds receives only the stronger-copy variant. Accounts dormant
//! past 30 days are left alone.

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use pulse_common::error::AppError;
use pulse_common::types::{Category, ProcessorReport, SendOutcome, SendRequest};

use crate::context::SchedulerContext;

const COHORT_LIMIT: i64 = 1000;

/// Inactivity tier, longest first — cascade order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cohort {
    SevenDay,
    FortyEightHour,
}

impl Cohort {
    fn template_id(self) -> &'static str {
        match self {
            Cohort::SevenDay => "inactivity_7d",
            Cohort::FortyEightHour => "inactivity_48h",
        }
    }

    fn key_suffix(self) -> &'static str {
        match self {
            Cohort::SevenDay => "7d",
            Cohort::FortyEightHour => "48h",
        }
    }

    /// Inactivity bounds in hours: candidates have been inactive at least
    /// `min` and less than `max` hours.
    fn bounds_hours(self) -> (i32, i32) {
        match self {
            Cohort::SevenDay => (7 * 24, 30 * 24),
            Cohort::FortyEightHour => (48, 7 * 24),
        }
    }
}

/// Drop candidates already notified earlier in the same run.
fn exclude_notified(candidates: Vec<Uuid>, notified: &HashSet<Uuid>) -> Vec<Uuid> {
    candidates
        .into_iter()
        .filter(|id| !notified.contains(id))
        .collect()
}

pub struct InactivityProcessor;

impl InactivityProcessor {
    pub async fn run(ctx: &mut SchedulerContext) -> ProcessorReport {
        let mut processed = 0u32;
        let mut skipped = 0u32;
        let mut notified: HashSet<Uuid> = HashSet::new();

        for cohort in [Cohort::SevenDay, Cohort::FortyEightHour] {
            let candidates = match Self::cohort_candidates(&ctx.pool, cohort).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, ?cohort, "Inactivity candidate query failed");
                    return ProcessorReport::failed(format!("candidate query failed: {e}"));
                }
            };

            for user_id in exclude_notified(candidates, &notified) {
                let request = SendRequest {
                    user_id,
                    category: Category::InactivityNudge,
                    template_id: cohort.template_id().to_string(),
                    variables: serde_json::json!({ "cohort": cohort.key_suffix() }),
                    entity_id: None,
                    dedupe_key: format!("inactivity:{}:{}", user_id, cohort.key_suffix()),
                };

                match ctx.gatekeeper.send(&mut ctx.redis, &request).await {
                    SendOutcome::Accepted => {
                        processed += 1;
                        notified.insert(user_id);
                    }
                    // A dedupe hit still claims the user for this run — the
                    // weaker cohort must not pick them up either
                    SendOutcome::SuppressedDuplicate => {
                        skipped += 1;
                        notified.insert(user_id);
                    }
                    _ => skipped += 1,
                }
            }
        }

        ProcessorReport::ok(processed, skipped, "inactivity cascade complete")
    }

    async fn cohort_candidates(pool: &PgPool, cohort: Cohort) -> Result<Vec<Uuid>, AppError> {
        let (min_hours, max_hours) = cohort.bounds_hours();

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM users
            WHERE last_active_at <  now() - make_interval(hours => $1)
              AND last_active_at >= now() - make_interval(hours => $2)
            ORDER BY last_active_at ASC
            LIMIT $3
            "#,
        )
        .bind(min_hours)
        .bind(max_hours)
        .bind(COHORT_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cohort_bounds_are_exclusive_tiers() {
        // A user inactive 9 days falls only in the 7-day cohort's range
        let nine_days = 9 * 24;
        let (min7, max7) = Cohort::SevenDay.bounds_hours();
        let (min48, max48) = Cohort::FortyEightHour.bounds_hours();
        assert!(nine_days >= min7 && nine_days < max7);
        assert!(!(nine_days >= min48 && nine_days < max48));

        // A user inactive 50 hours falls only in the 48-hour cohort's range
        let fifty_hours = 50;
        assert!(fifty_hours >= min48 && fifty_hours < max48);
        assert!(!(fifty_hours >= min7 && fifty_hours < max7));
    }

    #[test]
    fn test_tiers_do_not_overlap() {
        let (min7, _) = Cohort::SevenDay.bounds_hours();
        let (_, max48) = Cohort::FortyEightHour.bounds_hours();
        assert_eq!(max48, min7);
    }

    #[test]
    fn test_exclude_notified_drops_stronger_cohort_users() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let notified: HashSet<Uuid> = [a].into_iter().collect();

        let remaining = exclude_notified(vec![a, b, c], &notified);
        assert_eq!(remaining, vec![b, c]);
    }

    #[test]
    fn test_cohort_templates_differ() {
        assert_ne!(
            Cohort::SevenDay.template_id(),
            Cohort::FortyEightHour.template_id()
        );
        assert_ne!(
            Cohort::SevenDay.key_suffix(),
            Cohort::FortyEightHour.key_suffix()
        );
    }
}
