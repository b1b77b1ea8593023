//! Time normalization for the warehouse. Capacity accounting is
//! minute-granular in UTC; everything user-facing renders in Europe/Madrid
//! wall-clock time using real tzdb rules, never a fixed offset.

use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::Madrid;
use chrono_tz::Tz;

use crate::model::Window;

pub const WAREHOUSE_TZ: Tz = Madrid;

/// Round an instant down to the start of its containing minute.
pub fn minute_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp() - t.timestamp().rem_euclid(60);
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(t)
}

/// Render an instant as warehouse wall-clock time, `YYYY-MM-DD HH:MM`.
pub fn local_minute(t: DateTime<Utc>) -> String {
    t.with_timezone(&WAREHOUSE_TZ)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Local calendar date containing the instant.
pub fn local_date(t: DateTime<Utc>) -> NaiveDate {
    t.with_timezone(&WAREHOUSE_TZ).date_naive()
}

/// Local wall-clock time of day of the instant.
pub fn local_time(t: DateTime<Utc>) -> NaiveTime {
    t.with_timezone(&WAREHOUSE_TZ).time()
}

/// Local day of week, 0 = Sunday .. 6 = Saturday.
pub fn local_day_of_week(t: DateTime<Utc>) -> u8 {
    t.with_timezone(&WAREHOUSE_TZ).weekday().num_days_from_sunday() as u8
}

/// Day of week of a local calendar date, 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Resolve a warehouse wall-clock time to a UTC instant. A time the
/// fall-back fold makes ambiguous resolves to its first occurrence; a time
/// the spring-forward gap skips lands just after the jump.
pub fn resolve_local(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match WAREHOUSE_TZ.from_local_datetime(&naive) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        LocalResult::None => {
            match WAREHOUSE_TZ.from_local_datetime(&(naive + Duration::hours(1))) {
                LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
                // tzdb gaps are never longer than an hour in Madrid
                LocalResult::None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

/// UTC instant at which the given local date begins.
pub fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    resolve_local(date, NaiveTime::MIN)
}

/// UTC window covering the whole local calendar date.
pub fn local_day_window(date: NaiveDate) -> Window {
    let next = date.succ_opt().unwrap_or(date);
    Window::new(local_midnight(date), local_midnight(next))
}
