//! Timezone utilities — pure conversions from UTC instants to a user's
//! local clock, calendar date, and quiet-hour membership.
//!
//! All scheduling decisions (digest hour, recap weekday, cap date buckets)
//! go through these functions so that a single hourly UTC cron tick serves
//! users across every timezone. A malformed per-user timezone string falls
//! back rather than erroring — it must never abort a batch job.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Validate an IANA timezone string, falling back on any parse failure.
pub fn resolve_timezone(raw: &str, fallback: Tz) -> Tz {
    raw.parse().unwrap_or(fallback)
}

/// Local wall-clock (hour, minute) for an instant. Hour is 0..=23; a `24`
/// at local midnight folds to `0`.
pub fn local_clock(tz: Tz, instant: DateTime<Utc>) -> (u32, u32) {
    let local = instant.with_timezone(&tz);
    (local.hour() % 24, local.minute())
}

/// Local calendar date as `YYYY-MM-DD`, used as the cap/dedupe date bucket.
/// Computed from local time, not UTC, to avoid date-boundary skew.
pub fn local_date(tz: Tz, instant: DateTime<Utc>) -> String {
    instant.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// Local ISO weekday, 1 = Monday .. 7 = Sunday.
pub fn local_weekday(tz: Tz, instant: DateTime<Utc>) -> u32 {
    instant.with_timezone(&tz).weekday().number_from_monday()
}

/// Local ISO week bucket as `YYYY-Www`, used for weekly-recap dedupe keys.
/// Week-based (not date-based) so a local day straddling a UTC cron boundary
/// cannot produce two sends.
pub fn iso_week_key(tz: Tz, instant: DateTime<Utc>) -> String {
    let week = instant.with_timezone(&tz).iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Whether the instant falls inside the user's quiet-hour window.
///
/// `start == end` → window disabled, always false.
/// `start < end`  → same-day window, inclusive start, exclusive end.
/// `start > end`  → overnight wrap: true when local time >= start OR < end.
///
/// Malformed `HH:mm` strings disable the window rather than erroring.
pub fn is_quiet_hours(tz: Tz, start: &str, end: &str, instant: DateTime<Utc>) -> bool {
    let (Some((sh, sm)), Some((eh, em))) = (parse_hhmm(start), parse_hhmm(end)) else {
        return false;
    };

    let start_min = sh * 60 + sm;
    let end_min = eh * 60 + em;
    if start_min == end_min {
        return false;
    }

    let (h, m) = local_clock(tz, instant);
    let now_min = h * 60 + m;

    if start_min < end_min {
        now_min >= start_min && now_min < end_min
    } else {
        now_min >= start_min || now_min < end_min
    }
}

/// Whether the instant's local hour equals the hour component of `target`
/// (`HH:mm`). This is how one hourly cron tick covers all timezones without
/// per-user scheduling infrastructure.
pub fn local_hour_matches(tz: Tz, target: &str, instant: DateTime<Utc>) -> bool {
    match parse_hhmm(target) {
        Some((hour, _)) => local_clock(tz, instant).0 == hour,
        None => false,
    }
}

/// Seconds from the instant until the next local midnight, used as the
/// daily-cap counter TTL so the counter expires at local end-of-day.
pub fn seconds_until_local_midnight(tz: Tz, instant: DateTime<Utc>) -> u64 {
    const FALLBACK: u64 = 24 * 3600;

    let local = instant.with_timezone(&tz);
    let Some(next_day) = local.date_naive().succ_opt() else {
        return FALLBACK;
    };
    let Some(naive_midnight) = next_day.and_hms_opt(0, 0, 0) else {
        return FALLBACK;
    };
    // A DST jump can skip local midnight; take the earliest valid instant.
    let Some(midnight) = tz.from_local_datetime(&naive_midnight).earliest() else {
        return FALLBACK;
    };

    (midnight.with_timezone(&Utc) - instant).num_seconds().max(1) as u64
}

/// UTC bounds `[start, end)` of the local calendar day containing the
/// instant, used to count a user's events "today" by their clock.
pub fn local_day_bounds(tz: Tz, instant: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let fallback = || {
        let start = instant
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|n| Utc.from_utc_datetime(&n))
            .unwrap_or(instant);
        (start, start + chrono::Duration::days(1))
    };

    let local_day = instant.with_timezone(&tz).date_naive();
    let (Some(start_naive), Some(next_day)) =
        (local_day.and_hms_opt(0, 0, 0), local_day.succ_opt())
    else {
        return fallback();
    };
    let Some(end_naive) = next_day.and_hms_opt(0, 0, 0) else {
        return fallback();
    };
    let (Some(start), Some(end)) = (
        tz.from_local_datetime(&start_naive).earliest(),
        tz.from_local_datetime(&end_naive).earliest(),
    ) else {
        return fallback();
    };

    (start.with_timezone(&Utc), end.with_timezone(&Utc))
}

/// Next UTC instant at which the local wall clock reads `target` (`HH:mm`).
///
/// Returns `None` on a malformed target. If today's occurrence has already
/// passed (or is exactly now), the next day's is returned. Used to stamp
/// quiet-hour suppressions with the moment the window reopens.
pub fn next_local_time(tz: Tz, target: &str, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (hour, minute) = parse_hhmm(target)?;
    let local = instant.with_timezone(&tz);

    for day_offset in 0..=2 {
        let date = local
            .date_naive()
            .checked_add_days(chrono::Days::new(day_offset))?;
        let naive = date.and_hms_opt(hour, minute, 0)?;
        // A DST jump can make the target time nonexistent on some day
        let Some(candidate) = tz.from_local_datetime(&naive).earliest() else {
            continue;
        };
        let candidate = candidate.with_timezone(&Utc);
        if candidate > instant {
            return Some(candidate);
        }
    }

    None
}

fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn tz(s: &str) -> Tz {
        s.parse().unwrap()
    }

    #[test]
    fn test_resolve_timezone_valid() {
        assert_eq!(
            resolve_timezone("America/New_York", chrono_tz::UTC),
            tz("America/New_York")
        );
    }

    #[test]
    fn test_resolve_timezone_malformed_falls_back() {
        assert_eq!(resolve_timezone("Mars/Olympus", chrono_tz::UTC), chrono_tz::UTC);
        assert_eq!(resolve_timezone("", chrono_tz::UTC), chrono_tz::UTC);
    }

    #[test]
    fn test_local_clock_new_york_winter() {
        // 04:30 UTC on Jan 15 = 23:30 EST the previous day
        let (h, m) = local_clock(tz("America/New_York"), utc("2025-01-15T04:30:00Z"));
        assert_eq!((h, m), (23, 30));
    }

    #[test]
    fn test_local_date_straddles_calendar_boundary() {
        // Same instant, different local dates at UTC+14 vs UTC-12
        let instant = utc("2025-01-15T00:30:00Z");
        assert_eq!(local_date(tz("Pacific/Kiritimati"), instant), "2025-01-15");
        assert_eq!(local_date(tz("Etc/GMT+12"), instant), "2025-01-14");
    }

    #[test]
    fn test_local_weekday_iso() {
        // 2025-01-13 is a Monday
        assert_eq!(local_weekday(chrono_tz::UTC, utc("2025-01-13T12:00:00Z")), 1);
        // 2025-01-19 is a Sunday
        assert_eq!(local_weekday(chrono_tz::UTC, utc("2025-01-19T12:00:00Z")), 7);
    }

    #[test]
    fn test_iso_week_key_format() {
        assert_eq!(iso_week_key(chrono_tz::UTC, utc("2025-01-13T12:00:00Z")), "2025-W03");
        // Dec 29 2025 belongs to ISO week 1 of 2026
        assert_eq!(iso_week_key(chrono_tz::UTC, utc("2025-12-29T12:00:00Z")), "2026-W01");
    }

    #[test]
    fn test_quiet_hours_disabled_when_equal() {
        let ny = tz("America/New_York");
        for probe in ["2025-01-15T04:30:00Z", "2025-01-15T14:00:00Z", "2025-06-20T01:00:00Z"] {
            assert!(!is_quiet_hours(ny, "22:00", "22:00", utc(probe)));
        }
    }

    #[test]
    fn test_quiet_hours_overnight_wrap() {
        let ny = tz("America/New_York");
        // Local 23:30 → inside 22:00–08:00
        assert!(is_quiet_hours(ny, "22:00", "08:00", utc("2025-01-15T04:30:00Z")));
        // Local 09:00 → outside
        assert!(!is_quiet_hours(ny, "22:00", "08:00", utc("2025-01-15T14:00:00Z")));
        // Local 07:59 → still inside
        assert!(is_quiet_hours(ny, "22:00", "08:00", utc("2025-01-15T12:59:00Z")));
        // Local 08:00 → exclusive end
        assert!(!is_quiet_hours(ny, "22:00", "08:00", utc("2025-01-15T13:00:00Z")));
    }

    #[test]
    fn test_quiet_hours_same_day_window() {
        let utc_tz = chrono_tz::UTC;
        // 13:00–15:00, probe at 13:00 (inclusive start)
        assert!(is_quiet_hours(utc_tz, "13:00", "15:00", utc("2025-01-15T13:00:00Z")));
        // Probe at 15:00 (exclusive end)
        assert!(!is_quiet_hours(utc_tz, "13:00", "15:00", utc("2025-01-15T15:00:00Z")));
        assert!(!is_quiet_hours(utc_tz, "13:00", "15:00", utc("2025-01-15T12:59:00Z")));
    }

    #[test]
    fn test_quiet_hours_malformed_inputs_disable() {
        let utc_tz = chrono_tz::UTC;
        assert!(!is_quiet_hours(utc_tz, "25:00", "08:00", utc("2025-01-15T03:00:00Z")));
        assert!(!is_quiet_hours(utc_tz, "garbage", "08:00", utc("2025-01-15T03:00:00Z")));
        assert!(!is_quiet_hours(utc_tz, "22:00", "", utc("2025-01-15T03:00:00Z")));
    }

    #[test]
    fn test_local_hour_matches() {
        let ny = tz("America/New_York");
        // 23:00 UTC on Jan 15 = 18:00 EST
        assert!(local_hour_matches(ny, "18:00", utc("2025-01-15T23:00:00Z")));
        assert!(local_hour_matches(ny, "18:45", utc("2025-01-15T23:10:00Z")));
        assert!(!local_hour_matches(ny, "19:00", utc("2025-01-15T23:00:00Z")));
        assert!(!local_hour_matches(ny, "bogus", utc("2025-01-15T23:00:00Z")));
    }

    #[test]
    fn test_local_day_bounds_offset_timezone() {
        let ny = tz("America/New_York");
        // 04:30 UTC Jan 15 is still Jan 14 in New York (EST, UTC-5)
        let (start, end) = local_day_bounds(ny, utc("2025-01-15T04:30:00Z"));
        assert_eq!(start, utc("2025-01-14T05:00:00Z"));
        assert_eq!(end, utc("2025-01-15T05:00:00Z"));
    }

    #[test]
    fn test_local_day_bounds_utc() {
        let (start, end) = local_day_bounds(chrono_tz::UTC, utc("2025-01-15T12:00:00Z"));
        assert_eq!(start, utc("2025-01-15T00:00:00Z"));
        assert_eq!(end, utc("2025-01-16T00:00:00Z"));
    }

    #[test]
    fn test_seconds_until_local_midnight() {
        // 23:00 UTC = one hour to UTC midnight
        assert_eq!(
            seconds_until_local_midnight(chrono_tz::UTC, utc("2025-01-15T23:00:00Z")),
            3600
        );
        // 04:30 UTC = 23:30 EST → 30 minutes to local midnight
        assert_eq!(
            seconds_until_local_midnight(tz("America/New_York"), utc("2025-01-15T04:30:00Z")),
            1800
        );
    }

    #[test]
    fn test_next_local_time_same_day() {
        // 04:30 UTC = 23:30 EST; local 08:00 next occurs at 13:00 UTC
        let next = next_local_time(tz("America/New_York"), "08:00", utc("2025-01-15T04:30:00Z"));
        assert_eq!(next, Some(utc("2025-01-15T13:00:00Z")));
    }

    #[test]
    fn test_next_local_time_rolls_to_next_day() {
        // 14:00 UTC = 09:00 EST; local 08:00 already passed → tomorrow
        let next = next_local_time(tz("America/New_York"), "08:00", utc("2025-01-15T14:00:00Z"));
        assert_eq!(next, Some(utc("2025-01-16T13:00:00Z")));
    }

    #[test]
    fn test_next_local_time_malformed_target() {
        assert_eq!(
            next_local_time(chrono_tz::UTC, "25:99", utc("2025-01-15T14:00:00Z")),
            None
        );
    }
}
