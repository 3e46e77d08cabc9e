//! Business-day arithmetic (Mon-Fri, no holiday calendar).

use chrono::{Datelike, Days, NaiveDate, Weekday};
use slatrack_parser::Priority;

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Steps `days` business days away from `start`. The start day itself is never counted,
/// so a Friday plus one business day lands on Monday.
pub fn add_business_days(start: NaiveDate, days: i64) -> NaiveDate {
    let mut current = start;
    let mut remaining = days.unsigned_abs();
    while remaining > 0 {
        let next = if days >= 0 {
            current.checked_add_days(Days::new(1))
        } else {
            current.checked_sub_days(Days::new(1))
        };
        let Some(next) = next else {
            break;
        };
        current = next;
        if is_business_day(current) {
            remaining -= 1;
        }
    }
    current
}

/// Counts business days in `(start, end]`; negative when `end` precedes `start`.
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return -business_days_between(end, start);
    }

    let span = (end - start).num_days();
    let full_weeks = span / 7;
    let mut count = full_weeks * 5;

    let mut cursor = start + chrono::Duration::days(full_weeks * 7);
    while cursor < end {
        cursor = cursor.succ_opt().unwrap_or(end);
        if is_business_day(cursor) {
            count += 1;
        }
    }
    count
}

/// The due date the SLA table would assign to a request raised on `request_date`.
pub fn policy_due_date(request_date: NaiveDate, priority: Priority) -> NaiveDate {
    add_business_days(request_date, i64::from(priority.sla_business_days()))
}
