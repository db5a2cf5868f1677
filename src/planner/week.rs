//! Week keys and day indices for the meal planner.
//!
//! Weeks run Monday to Sunday. A week is identified by the `YYYY-MM-DD` date
//! of its Monday, and days inside it by an index where Monday is 0.

use time::{
    format_description::BorrowedFormatItem, macros::format_description, Date, Duration,
    OffsetDateTime, Time,
};

/// Monday on or before `date`.
pub fn monday_of(date: Date) -> Date {
    let back = i64::from(date.weekday().number_days_from_monday());
    date.saturating_sub(Duration::days(back))
}

/// Midnight on the Monday that starts the week containing `at`, in `at`'s offset.
pub fn start_of_week(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_date(monday_of(at.date()))
        .replace_time(Time::MIDNIGHT)
}

const WEEK_KEY_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub fn week_key_for_date(date: Date) -> String {
    monday_of(date)
        .format(WEEK_KEY_FORMAT)
        .unwrap_or_default()
}

pub fn current_week_key(now: OffsetDateTime) -> String {
    week_key_for_date(now.date())
}

/// Whole days between the start of the week and `now`: 0 = Monday .. 6 = Sunday.
pub fn today_day_index(now: OffsetDateTime) -> u8 {
    let days = (now.date() - start_of_week(now).date()).whole_days();
    // always 0..=6
    u8::try_from(days).unwrap_or_default()
}

/// Parses a `YYYY-MM-DD` key and snaps it to the Monday of its week.
pub fn canonical_week_key(raw: &str) -> Option<String> {
    Date::parse(raw.trim(), WEEK_KEY_FORMAT)
        .ok()
        .map(week_key_for_date)
}

/// Day index encoded in a composite plan key (`"3_dinner"` -> 3).
/// Keys without a `_` or with a non-numeric prefix yield `None`.
pub fn day_index_of(composite_key: &str) -> Option<u8> {
    let (day, _slot) = composite_key.split_once('_')?;
    day.trim().parse().ok()
}
