//! # Week Module
//!
//! Calendar helpers for the one-list-per-week model.
//!
//! Lists are keyed by the instant their week starts. Two requests for the
//! "same" week must agree regardless of time of day, so every lookup and
//! creation goes through [`week_start`] first. Weeks start on Monday.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use grocer_core::week::{week_label, week_start};
//!
//! let wednesday_evening = Utc.with_ymd_and_hms(2024, 3, 6, 19, 30, 0).unwrap();
//! let monday = week_start(wednesday_evening);
//!
//! assert_eq!(monday, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
//! assert_eq!(week_label(wednesday_evening), "Week of Mar 4–10");
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// Returns Monday 00:00:00 UTC of the week containing `instant`.
pub fn week_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    let days_from_monday = i64::from(instant.weekday().num_days_from_monday());
    let monday = instant.date_naive() - Duration::days(days_from_monday);
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// True if both instants fall on the same calendar day (UTC).
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Human label for the week containing `instant`, e.g. `"Week of Mar 4–10"`.
pub fn week_label(instant: DateTime<Utc>) -> String {
    let start = week_start(instant);
    let end = start + Duration::days(6);
    format!("Week of {}–{}", start.format("%b %-d"), end.format("%-d"))
}

/// Returns `count` instants, one per week, going back from `now`.
///
/// The first element is `now` itself; callers normalize with [`week_start`]
/// when they need list keys.
pub fn past_weeks(now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    (0..count)
        .map(|i| now - Duration::weeks(i as i64))
        .collect()
}
