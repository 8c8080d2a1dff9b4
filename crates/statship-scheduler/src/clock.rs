//! Frequency clock — pure schedule math over an injected "now".
//!
//! Nothing here reads the system clock; the tick loop passes its own
//! timestamp so every decision is reproducible in tests.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use statship_core::types::{Frequency, Job};

/// Half-width of the due window in seconds. Slightly wider than the 60 s
/// tick interval jitter so a job on the tick boundary is never missed.
pub const DUE_TOLERANCE_SECS: i64 = 30;

/// Whether `job` is due in the tick at `now`.
///
/// Daily jobs match when `now`'s time-of-day falls within the tolerance
/// window around `execution_time` (wrapping at midnight). Weekly jobs
/// additionally require the weekday to match, monthly jobs the day of
/// month. A monthly `day` that does not exist in the current month (31 in
/// April) never matches that month; the projector clamps instead.
pub fn is_due(job: &Job, now: DateTime<Utc>) -> bool {
    if !job.is_active || !time_matches(job, now) {
        return false;
    }
    match job.frequency {
        Frequency::Daily => true,
        Frequency::Weekly => job.day == Some(now.weekday().num_days_from_monday()),
        Frequency::Monthly => job.day == Some(now.day()),
    }
}

fn time_matches(job: &Job, now: DateTime<Utc>) -> bool {
    let now_secs = i64::from(now.time().num_seconds_from_midnight());
    let exec_secs = i64::from(job.execution_time.num_seconds_from_midnight());
    let diff = (now_secs - exec_secs).abs();
    // Wrap-around: 23:59:50 vs 00:00:10 is 20 seconds apart, not 86380.
    diff.min(86_400 - diff) <= DUE_TOLERANCE_SECS
}

/// The next `count` scheduled timestamps for `job`, all ≥ `now`.
///
/// Monthly days beyond the target month's length are clamped to its last
/// day, so a `day = 31` job projects onto April 30th rather than skipping
/// to May.
pub fn project_next_runs(job: &Job, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    if count == 0 {
        return Vec::new();
    }
    match job.frequency {
        Frequency::Daily => project_daily(job, now, count),
        Frequency::Weekly => project_weekly(job, now, count),
        Frequency::Monthly => project_monthly(job, now, count),
    }
}

fn project_daily(job: &Job, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    let mut runs = Vec::with_capacity(count);
    let mut date = now.date_naive();
    while runs.len() < count {
        let candidate = at_execution_time(date, job);
        if candidate >= now {
            runs.push(candidate);
        }
        date += Duration::days(1);
    }
    runs
}

fn project_weekly(job: &Job, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    // A weekday outside 0-6 never matches; bail instead of scanning forever.
    let Some(target_weekday) = job.day.filter(|d| *d <= 6) else {
        return Vec::new();
    };
    let mut runs = Vec::with_capacity(count);
    let mut date = now.date_naive();
    // Today counts if its run is still upcoming; otherwise the scan walks
    // forward day by day until enough matching weekdays pass.
    while runs.len() < count {
        if date.weekday().num_days_from_monday() == target_weekday {
            let candidate = at_execution_time(date, job);
            if candidate >= now {
                runs.push(candidate);
            }
        }
        date += Duration::days(1);
    }
    runs
}

fn project_monthly(job: &Job, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    // Day 0 (or anything past 31) produces no valid date in any month.
    let Some(target_day) = job.day.filter(|d| (1..=31).contains(d)) else {
        return Vec::new();
    };
    let mut runs = Vec::with_capacity(count);
    let mut year = now.year();
    let mut month = now.month();
    while runs.len() < count {
        let day = target_day.min(last_day_of_month(year, month));
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let candidate = at_execution_time(date, job);
            if candidate >= now {
                runs.push(candidate);
            }
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    runs
}

fn at_execution_time(date: NaiveDate, job: &Job) -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDateTime::new(date, job.execution_time))
}

/// Number of days in the given month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_y, next_m, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use statship_core::types::ReportType;

    fn job(frequency: Frequency, day: Option<u32>, exec: &str) -> Job {
        Job {
            id: 1,
            name: "test".into(),
            sender_id: Some(1),
            instance_id: 1,
            website_id: "site-1".into(),
            report_type: ReportType::Summary,
            summary_items: vec![],
            report_id: None,
            frequency,
            day,
            execution_time: exec.parse::<NaiveTime>().unwrap(),
            email_recipients: vec![],
            webhook_recipients: vec![],
            timezone: "UTC".into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_daily_due_window() {
        let j = job(Frequency::Daily, None, "08:00:00");
        assert!(is_due(&j, at(2026, 3, 2, 8, 0, 0)));
        assert!(is_due(&j, at(2026, 3, 2, 8, 0, 30)));
        assert!(is_due(&j, at(2026, 3, 2, 7, 59, 31)));
        assert!(!is_due(&j, at(2026, 3, 2, 8, 0, 31)));
        assert!(!is_due(&j, at(2026, 3, 2, 9, 0, 0)));
    }

    #[test]
    fn test_daily_due_window_wraps_midnight() {
        let j = job(Frequency::Daily, None, "23:59:50");
        assert!(is_due(&j, at(2026, 3, 3, 0, 0, 10)));
        let j = job(Frequency::Daily, None, "00:00:05");
        assert!(is_due(&j, at(2026, 3, 2, 23, 59, 40)));
    }

    #[test]
    fn test_weekly_requires_matching_weekday() {
        // 2026-03-04 is a Wednesday (weekday 2).
        let j = job(Frequency::Weekly, Some(2), "08:00:00");
        assert!(is_due(&j, at(2026, 3, 4, 8, 0, 5)));
        assert!(!is_due(&j, at(2026, 3, 5, 8, 0, 5)));
        // No weekday configured: never due.
        let j = job(Frequency::Weekly, None, "08:00:00");
        assert!(!is_due(&j, at(2026, 3, 4, 8, 0, 5)));
    }

    #[test]
    fn test_monthly_never_fires_in_short_months() {
        let j = job(Frequency::Monthly, Some(31), "08:00:00");
        assert!(is_due(&j, at(2026, 1, 31, 8, 0, 0)));
        // April has 30 days — the due check stays strict.
        assert!(!is_due(&j, at(2026, 4, 30, 8, 0, 0)));
    }

    #[test]
    fn test_inactive_job_is_never_due() {
        let mut j = job(Frequency::Daily, None, "08:00:00");
        j.is_active = false;
        assert!(!is_due(&j, at(2026, 3, 2, 8, 0, 0)));
    }

    #[test]
    fn test_project_daily_includes_today_if_upcoming() {
        let j = job(Frequency::Daily, None, "08:00:00");
        let runs = project_next_runs(&j, at(2026, 3, 2, 7, 0, 0), 3);
        assert_eq!(runs[0], at(2026, 3, 2, 8, 0, 0));
        assert_eq!(runs[1], at(2026, 3, 3, 8, 0, 0));
        assert_eq!(runs[2], at(2026, 3, 4, 8, 0, 0));

        // Past today's time: starts tomorrow.
        let runs = project_next_runs(&j, at(2026, 3, 2, 9, 0, 0), 1);
        assert_eq!(runs[0], at(2026, 3, 3, 8, 0, 0));
    }

    #[test]
    fn test_project_weekly() {
        // From Monday 2026-03-02, Wednesday runs land on the 4th, 11th, 18th.
        let j = job(Frequency::Weekly, Some(2), "08:00:00");
        let runs = project_next_runs(&j, at(2026, 3, 2, 12, 0, 0), 3);
        assert_eq!(runs[0], at(2026, 3, 4, 8, 0, 0));
        assert_eq!(runs[1], at(2026, 3, 11, 8, 0, 0));
        assert_eq!(runs[2], at(2026, 3, 18, 8, 0, 0));
    }

    #[test]
    fn test_project_monthly_clamps_to_last_day() {
        let j = job(Frequency::Monthly, Some(31), "08:00:00");
        let runs = project_next_runs(&j, at(2026, 3, 31, 9, 0, 0), 3);
        // March run already past → April 30 (clamped), May 31, June 30.
        assert_eq!(runs[0], at(2026, 4, 30, 8, 0, 0));
        assert_eq!(runs[1], at(2026, 5, 31, 8, 0, 0));
        assert_eq!(runs[2], at(2026, 6, 30, 8, 0, 0));
    }

    #[test]
    fn test_project_monthly_february() {
        let j = job(Frequency::Monthly, Some(30), "06:00:00");
        let runs = project_next_runs(&j, at(2026, 1, 31, 0, 0, 0), 2);
        assert_eq!(runs[0], at(2026, 2, 28, 6, 0, 0));
        assert_eq!(runs[1], at(2026, 3, 30, 6, 0, 0));
    }

    #[test]
    fn test_projection_rejects_out_of_range_day() {
        let j = job(Frequency::Weekly, Some(9), "08:00:00");
        assert!(project_next_runs(&j, at(2026, 3, 2, 0, 0, 0), 3).is_empty());
        let j = job(Frequency::Monthly, Some(0), "08:00:00");
        assert!(project_next_runs(&j, at(2026, 3, 2, 0, 0, 0), 3).is_empty());
        let j = job(Frequency::Monthly, Some(32), "08:00:00");
        assert!(project_next_runs(&j, at(2026, 3, 2, 0, 0, 0), 3).is_empty());
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2026, 2), 28);
        assert_eq!(last_day_of_month(2028, 2), 29);
        assert_eq!(last_day_of_month(2026, 12), 31);
        assert_eq!(last_day_of_month(2026, 4), 30);
    }
}
