// =============================================================================
// Civil day / midnight-window arithmetic
// =============================================================================
//
// All operations here take a `chrono_tz::Tz` rather than a naive offset, so a
// caller cannot accidentally feed in an unzoned instant: `DateTime<Utc>` (or
// any other zoned type) is converted through `with_timezone`, which is total.
// The source project's equivalent raises `ValueError` on a naive datetime;
// this port makes that state unrepresentable instead of checking for it.
// =============================================================================

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The instant of local 00:00 on the calendar date of `now`, in `zone`.
pub fn day_start_for(now: DateTime<Utc>, zone: Tz) -> DateTime<Utc> {
    let local = now.with_timezone(&zone);
    midnight_of(local.date_naive(), zone)
}

/// True iff `now`'s civil day (in `zone`) is strictly after `day_start`'s.
pub fn needs_day_reset(now: DateTime<Utc>, day_start: DateTime<Utc>, zone: Tz) -> bool {
    day_start_for(now, zone) > day_start_for(day_start, zone)
}

/// The local calendar date of `timestamp`, in `zone`.
pub fn trading_day_for(timestamp: DateTime<Utc>, zone: Tz) -> NaiveDate {
    timestamp.with_timezone(&zone).date_naive()
}

/// The instant of the next local 00:00 strictly after `now`.
pub fn next_midnight(now: DateTime<Utc>, zone: Tz) -> DateTime<Utc> {
    let local = now.with_timezone(&zone);
    let next_day = local.date_naive().succ_opt().expect("date overflow");
    midnight_of(next_day, zone)
}

/// Non-negative whole minutes remaining until the next local midnight.
pub fn minutes_until_midnight(now: DateTime<Utc>, zone: Tz) -> i64 {
    let midnight = next_midnight(now, zone);
    let delta = midnight.signed_duration_since(now);
    (delta.num_seconds() / 60).max(0)
}

/// True iff a positive midnight window is configured and `now` falls inside
/// it.
pub fn in_midnight_window(now: DateTime<Utc>, zone: Tz, window_minutes: i64) -> bool {
    window_minutes > 0 && minutes_until_midnight(now, zone) <= window_minutes
}

fn midnight_of(date: NaiveDate, zone: Tz) -> DateTime<Utc> {
    let naive_midnight = date.and_time(NaiveTime::MIN);
    zone.from_local_datetime(&naive_midnight)
        .single()
        .unwrap_or_else(|| zone.from_utc_datetime(&naive_midnight))
        .with_timezone(&Utc)
}
