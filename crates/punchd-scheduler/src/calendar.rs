//! Pure wall-clock policy checks. No side effects; callers pass `now` in.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};

use punchd_core::types::TimeWindow;

/// True iff `now` falls on an allowed weekday with a time-of-day inside
/// `[start, end)`.
pub fn is_within_active_window(now: NaiveDateTime, window: &TimeWindow) -> bool {
    if !window.weekdays.contains(&now.weekday()) {
        return false;
    }
    let t = now.time();
    t >= window.start && t < window.end
}

/// Smallest instant strictly after `now` that lands on an allowed weekday
/// at time-of-day `at`.
///
/// A target exactly equal to `now` counts as already passed. Weekends (or
/// any weekday missing from the set) are skipped, so a Friday-evening query
/// lands on Monday. Returns `None` only for an empty weekday set.
pub fn next_occurrence(
    now: NaiveDateTime,
    weekdays: &[Weekday],
    at: NaiveTime,
) -> Option<NaiveDateTime> {
    if weekdays.is_empty() {
        return None;
    }

    // Day-stepping covers midnight rollover; 0..=7 reaches the same weekday
    // one week out when today's occurrence has already passed.
    for days_ahead in 0..=7 {
        let date = now.date() + Duration::days(days_ahead);
        if !weekdays.contains(&date.weekday()) {
            continue;
        }
        let candidate = date.and_time(at);
        if candidate > now {
            return Some(candidate);
        }
    }
    None
}
