//! Isolates all timezone-sensitive "what day is it" math in one place
//! (SPEC_FULL.md §9: timezone-sensitive "today" must live in a single helper).

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;

/// UTC instants bounding the local calendar day that `now` falls on in `zone`.
/// `start` is inclusive, `end` is exclusive.
pub fn day_bounds_utc(now: DateTime<Utc>, zone: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_date = now.with_timezone(&zone).date_naive();
    let start_naive = local_date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    let start = resolve_local(zone, start_naive);
    let end = start + Duration::days(1);
    (start, end)
}

/// Resolves a naive local datetime to UTC, preferring the earliest valid
/// offset across a DST fold (fine for midnight boundaries, which never land
/// in a skipped hour in the zones this system targets).
fn resolve_local(zone: Tz, naive: chrono::NaiveDateTime) -> DateTime<Utc> {
    zone.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| zone.from_utc_datetime(&naive))
        .with_timezone(&Utc)
}

pub fn parse_zone(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::Europe::Moscow)
}
